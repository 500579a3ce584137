// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed values from Arrow record batches.
//!
//! The row type, not the Arrow data type, decides how a column is read. The
//! Arrow type only selects the physical accessor:
//!
//! | Logical type | Arrow layouts |
//! |---|---|
//! | FIXED | Int8..Int64, Decimal128 (unscaled) |
//! | REAL | Float64, Float32 |
//! | DECFLOAT | Struct { exponent: Int16, significand: Binary } |
//! | DATE | Date32, Date64 |
//! | TIME | Int64 / Int32 scaled by `10^scale` |
//! | TIMESTAMP_NTZ / LTZ | Int64 scaled, or Struct { epoch, fraction } |
//! | TIMESTAMP_TZ | Struct { epoch scaled, tz } or { epoch, fraction, tz } |
//! | OBJECT / ARRAY / MAP | Struct / List / Map when structured, else text |
//! | everything else | Utf8, LargeUtf8, Utf8View, Binary |

use crate::error::{Error, Result};
use crate::reader::chunks::convert::{
    date_from_days, decfloat_value, fixed_value, split_scaled, text_from_bytes, time_of_day,
    timestamp_value, unknown_type, utc_datetime, ConvertOptions,
};
use crate::types::location::offset_from_biased_minutes;
use crate::types::row_type::{ColumnType, LogicalType, RowType};
use crate::types::value::{ChunkRow, Decimal, Value};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type,
};
use arrow_array::{Array, RecordBatch, StructArray};
use arrow_schema::{DataType, Field};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Materialize a record batch into rows.
pub fn batch_to_rows(
    batch: &RecordBatch,
    row_type: &RowType,
    options: &ConvertOptions,
) -> Result<Vec<ChunkRow>> {
    if batch.num_columns() != row_type.len() {
        return Err(Error::decode(format!(
            "record batch has {} columns, row type declares {}",
            batch.num_columns(),
            row_type.len()
        )));
    }

    let mut rows: Vec<ChunkRow> = (0..batch.num_rows())
        .map(|_| Vec::with_capacity(row_type.len()))
        .collect();
    for (array, column) in batch.columns().iter().zip(row_type.iter()) {
        let values = column_values(array.as_ref(), column, options)?;
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value);
        }
    }
    Ok(rows)
}

/// Convert one column. The result has exactly `array.len()` values.
pub fn column_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let Some(logical) = column.logical_type else {
        return collect(array, |_| Err(unknown_type(column)));
    };
    match logical {
        LogicalType::Fixed => fixed_values(array, column, options),
        LogicalType::Real => real_values(array, column),
        LogicalType::Decfloat => decfloat_values(array, column, options),
        LogicalType::Boolean => {
            let a = array
                .as_boolean_opt()
                .ok_or_else(|| unsupported(column, array))?;
            collect(array, |i| Ok(Value::Boolean(a.value(i))))
        }
        LogicalType::Date => date_values(array, column),
        LogicalType::Time => time_values(array, column),
        LogicalType::TimestampNtz | LogicalType::TimestampLtz | LogicalType::TimestampTz => {
            timestamp_values(array, column, logical, options)
        }
        LogicalType::Binary => binary_values(array, column),
        LogicalType::Null => Ok(vec![Value::Null; array.len()]),
        LogicalType::Object if matches!(array.data_type(), DataType::Struct(_)) => {
            object_values(array, column, options)
        }
        LogicalType::Array
            if matches!(array.data_type(), DataType::List(_) | DataType::LargeList(_)) =>
        {
            list_values(array, column, options)
        }
        LogicalType::Map if matches!(array.data_type(), DataType::Map(_, _)) => {
            map_values(array, column, options)
        }
        LogicalType::Text
        | LogicalType::Variant
        | LogicalType::Object
        | LogicalType::Array
        | LogicalType::Map => text_values(array, column, options),
    }
}

fn collect<F>(array: &dyn Array, mut f: F) -> Result<Vec<Value>>
where
    F: FnMut(usize) -> Result<Value>,
{
    (0..array.len())
        .map(|i| {
            if array.is_null(i) {
                Ok(Value::Null)
            } else {
                f(i)
            }
        })
        .collect()
}

fn unsupported(column: &ColumnType, array: &dyn Array) -> Error {
    Error::decode(format!(
        "column '{}' of type {} cannot be read from Arrow {}",
        column.name,
        column.type_name,
        array.data_type()
    ))
}

fn fixed_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let scale = column.scale;
    let hp = options.higher_precision;
    match array.data_type() {
        DataType::Int8 => {
            let a = array.as_primitive::<Int8Type>();
            collect(array, |i| fixed_value(a.value(i) as i128, scale, hp))
        }
        DataType::Int16 => {
            let a = array.as_primitive::<Int16Type>();
            collect(array, |i| fixed_value(a.value(i) as i128, scale, hp))
        }
        DataType::Int32 => {
            let a = array.as_primitive::<Int32Type>();
            collect(array, |i| fixed_value(a.value(i) as i128, scale, hp))
        }
        DataType::Int64 => {
            let a = array.as_primitive::<Int64Type>();
            collect(array, |i| fixed_value(a.value(i) as i128, scale, hp))
        }
        DataType::Decimal128(_, _) => {
            let a = array.as_primitive::<Decimal128Type>();
            collect(array, |i| fixed_value(a.value(i), scale, hp))
        }
        _ => Err(unsupported(column, array)),
    }
}

fn real_values(array: &dyn Array, column: &ColumnType) -> Result<Vec<Value>> {
    if let Some(a) = array.as_primitive_opt::<Float64Type>() {
        return collect(array, |i| Ok(Value::Float(a.value(i))));
    }
    if let Some(a) = array.as_primitive_opt::<Float32Type>() {
        return collect(array, |i| Ok(Value::Float(a.value(i) as f64)));
    }
    Err(unsupported(column, array))
}

fn decfloat_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let s = array
        .as_struct_opt()
        .ok_or_else(|| unsupported(column, array))?;
    let exponent = s
        .column_by_name("exponent")
        .and_then(|c| c.as_primitive_opt::<Int16Type>())
        .ok_or_else(|| unsupported(column, array))?;
    let significand = s
        .column_by_name("significand")
        .and_then(|c| c.as_binary_opt::<i32>())
        .ok_or_else(|| unsupported(column, array))?;

    collect(array, |i| {
        let unscaled = signed_be_bytes(significand.value(i))?;
        let decimal = Decimal::new(unscaled, -(exponent.value(i) as i32));
        Ok(decfloat_value(decimal, options.higher_precision))
    })
}

/// Big-endian two's complement integer of up to 16 bytes.
fn signed_be_bytes(bytes: &[u8]) -> Result<i128> {
    if bytes.len() > 16 {
        return Err(Error::decode(format!(
            "DECFLOAT significand of {} bytes does not fit 128 bits",
            bytes.len()
        )));
    }
    let fill = match bytes.first() {
        Some(b) if b & 0x80 != 0 => 0xff,
        _ => 0x00,
    };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

fn date_values(array: &dyn Array, column: &ColumnType) -> Result<Vec<Value>> {
    if let Some(a) = array.as_primitive_opt::<Date32Type>() {
        return collect(array, |i| Ok(Value::Date(date_from_days(a.value(i) as i64)?)));
    }
    if let Some(a) = array.as_primitive_opt::<Date64Type>() {
        return collect(array, |i| {
            Ok(Value::Date(date_from_days(
                a.value(i).div_euclid(MILLIS_PER_DAY),
            )?))
        });
    }
    Err(unsupported(column, array))
}

fn time_values(array: &dyn Array, column: &ColumnType) -> Result<Vec<Value>> {
    let scale = column.scale;
    let to_time = |raw: i64| -> Result<Value> {
        let (secs, nanos) = split_scaled(raw, scale)?;
        Ok(Value::Time(time_of_day(secs, nanos)?))
    };
    if let Some(a) = array.as_primitive_opt::<Int64Type>() {
        return collect(array, |i| to_time(a.value(i)));
    }
    if let Some(a) = array.as_primitive_opt::<Int32Type>() {
        return collect(array, |i| to_time(a.value(i) as i64));
    }
    Err(unsupported(column, array))
}

fn timestamp_values(
    array: &dyn Array,
    column: &ColumnType,
    kind: LogicalType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let scale = column.scale;
    let location = &options.location;

    if kind != LogicalType::TimestampTz {
        if let Some(a) = array.as_primitive_opt::<Int64Type>() {
            return collect(array, |i| {
                let (secs, nanos) = split_scaled(a.value(i), scale)?;
                Ok(timestamp_value(kind, utc_datetime(secs, nanos)?, None, location))
            });
        }
    }

    let s = array
        .as_struct_opt()
        .ok_or_else(|| unsupported(column, array))?;
    match (kind, s.num_columns()) {
        (LogicalType::TimestampTz, 2) => {
            let epoch = int64_child(s, 0, column)?;
            let tz = int32_child(s, 1, column)?;
            collect(array, |i| {
                let (secs, nanos) = split_scaled(epoch.value(i), scale)?;
                let offset = offset_from_biased_minutes(tz.value(i) as i64)?;
                Ok(timestamp_value(
                    kind,
                    utc_datetime(secs, nanos)?,
                    Some(offset),
                    location,
                ))
            })
        }
        (LogicalType::TimestampTz, 3) => {
            let epoch = int64_child(s, 0, column)?;
            let fraction = int32_child(s, 1, column)?;
            let tz = int32_child(s, 2, column)?;
            collect(array, |i| {
                let offset = offset_from_biased_minutes(tz.value(i) as i64)?;
                let utc = utc_datetime(epoch.value(i), fraction.value(i) as i64)?;
                Ok(timestamp_value(kind, utc, Some(offset), location))
            })
        }
        (LogicalType::TimestampNtz | LogicalType::TimestampLtz, 2) => {
            let epoch = int64_child(s, 0, column)?;
            let fraction = int32_child(s, 1, column)?;
            collect(array, |i| {
                let utc = utc_datetime(epoch.value(i), fraction.value(i) as i64)?;
                Ok(timestamp_value(kind, utc, None, location))
            })
        }
        _ => Err(unsupported(column, array)),
    }
}

fn int64_child<'a>(
    s: &'a StructArray,
    idx: usize,
    column: &ColumnType,
) -> Result<&'a arrow_array::Int64Array> {
    s.column(idx)
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| unsupported(column, s.column(idx).as_ref()))
}

fn int32_child<'a>(
    s: &'a StructArray,
    idx: usize,
    column: &ColumnType,
) -> Result<&'a arrow_array::Int32Array> {
    s.column(idx)
        .as_primitive_opt::<Int32Type>()
        .ok_or_else(|| unsupported(column, s.column(idx).as_ref()))
}

fn binary_values(array: &dyn Array, column: &ColumnType) -> Result<Vec<Value>> {
    if let Some(a) = array.as_binary_opt::<i32>() {
        return collect(array, |i| Ok(Value::Binary(a.value(i).to_vec())));
    }
    if let Some(a) = array.as_binary_opt::<i64>() {
        return collect(array, |i| Ok(Value::Binary(a.value(i).to_vec())));
    }
    if let Some(a) = array.as_fixed_size_binary_opt() {
        return collect(array, |i| Ok(Value::Binary(a.value(i).to_vec())));
    }
    Err(unsupported(column, array))
}

fn text_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    if let Some(a) = array.as_string_opt::<i32>() {
        return collect(array, |i| Ok(Value::Text(a.value(i).to_string())));
    }
    if let Some(a) = array.as_string_opt::<i64>() {
        return collect(array, |i| Ok(Value::Text(a.value(i).to_string())));
    }
    if let Some(a) = array.as_string_view_opt() {
        return collect(array, |i| Ok(Value::Text(a.value(i).to_string())));
    }
    // Binary-encoded text is where invalid UTF-8 can show up.
    if let Some(a) = array.as_binary_opt::<i32>() {
        return collect(array, |i| {
            Ok(Value::Text(text_from_bytes(a.value(i), options.validate_utf8)?))
        });
    }
    Err(unsupported(column, array))
}

/// Metadata for a nested field: the row type's entry when the server sent
/// one, otherwise whatever the Arrow field metadata says.
fn nested_column(parent: &ColumnType, idx: usize, field: &Field) -> ColumnType {
    if let Some(declared) = parent.fields.get(idx) {
        return declared.clone();
    }
    let metadata = field.metadata();
    let lookup = |key: &str| {
        metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    };
    let type_name = lookup("logicalType").unwrap_or("TEXT");
    ColumnType::from_type_name(field.name().clone(), type_name)
        .with_scale(lookup("scale").and_then(|v| v.parse().ok()).unwrap_or(0))
        .with_precision(lookup("precision").and_then(|v| v.parse().ok()).unwrap_or(0))
        .with_nullable(field.is_nullable())
}

fn object_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let s = array
        .as_struct_opt()
        .ok_or_else(|| unsupported(column, array))?;

    let mut children = Vec::with_capacity(s.num_columns());
    for (idx, (field, child)) in s.fields().iter().zip(s.columns()).enumerate() {
        let meta = nested_column(column, idx, field);
        let values = column_values(child.as_ref(), &meta, options)?;
        children.push((meta.name, values.into_iter()));
    }

    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        let entries: Vec<(String, Value)> = children
            .iter_mut()
            .map(|(name, values)| (name.clone(), values.next().unwrap_or(Value::Null)))
            .collect();
        out.push(if array.is_null(i) {
            Value::Null
        } else {
            Value::Object(entries)
        });
    }
    Ok(out)
}

fn list_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let element_field = match array.data_type() {
        DataType::List(f) | DataType::LargeList(f) => f.clone(),
        _ => return Err(unsupported(column, array)),
    };
    let element = nested_column(column, 0, &element_field);

    if let Some(list) = array.as_list_opt::<i32>() {
        let values = column_values(list.values().as_ref(), &element, options)?;
        let offsets = list.value_offsets();
        return collect(array, |i| {
            Ok(Value::Array(
                values[offsets[i] as usize..offsets[i + 1] as usize].to_vec(),
            ))
        });
    }
    if let Some(list) = array.as_list_opt::<i64>() {
        let values = column_values(list.values().as_ref(), &element, options)?;
        let offsets = list.value_offsets();
        return collect(array, |i| {
            Ok(Value::Array(
                values[offsets[i] as usize..offsets[i + 1] as usize].to_vec(),
            ))
        });
    }
    Err(unsupported(column, array))
}

fn map_values(
    array: &dyn Array,
    column: &ColumnType,
    options: &ConvertOptions,
) -> Result<Vec<Value>> {
    let map = array.as_map_opt().ok_or_else(|| unsupported(column, array))?;
    let entries = map.entries();
    let entry_fields = entries.fields();
    if entry_fields.len() != 2 {
        return Err(unsupported(column, array));
    }
    let key_meta = nested_column(column, 0, &entry_fields[0]);
    let value_meta = nested_column(column, 1, &entry_fields[1]);
    let keys = column_values(map.keys().as_ref(), &key_meta, options)?;
    let values = column_values(map.values().as_ref(), &value_meta, options)?;
    let offsets = map.value_offsets();

    collect(array, |i| {
        let range = offsets[i] as usize..offsets[i + 1] as usize;
        Ok(Value::Map(
            keys[range.clone()]
                .iter()
                .cloned()
                .zip(values[range].iter().cloned())
                .collect(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::location::Location;
    use arrow_array::builder::{Int64Builder, MapBuilder, StringBuilder};
    use arrow_array::{
        ArrayRef, BinaryArray, Date32Array, Decimal128Array, Float64Array, Int16Array,
        Int32Array, Int64Array, ListArray, StringArray,
    };
    use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
    use arrow_schema::{Fields, Schema};
    use chrono::{NaiveDate, Timelike};
    use std::sync::Arc;

    fn opts() -> ConvertOptions {
        ConvertOptions::default()
    }

    fn values(array: ArrayRef, column: &ColumnType) -> Vec<Value> {
        column_values(array.as_ref(), column, &opts()).unwrap()
    }

    #[test]
    fn test_fixed_from_int64_with_scale() {
        let col = ColumnType::new("AMOUNT", LogicalType::Fixed).with_scale(2);
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(12345), None, Some(-5)]));
        assert_eq!(
            values(array.clone(), &col),
            vec![Value::Float(123.45), Value::Null, Value::Float(-0.05)]
        );

        let hp = ConvertOptions {
            higher_precision: true,
            ..opts()
        };
        assert_eq!(
            column_values(array.as_ref(), &col, &hp).unwrap()[0],
            Value::Decimal(Decimal::new(12345, 2))
        );
    }

    #[test]
    fn test_fixed_from_decimal128() {
        let col = ColumnType::new("BIG", LogicalType::Fixed).with_precision(38);
        let big = i64::MAX as i128 + 1;
        let array: ArrayRef = Arc::new(
            Decimal128Array::from(vec![big, 7])
                .with_precision_and_scale(38, 0)
                .unwrap(),
        );
        let hp = ConvertOptions {
            higher_precision: true,
            ..opts()
        };
        assert_eq!(
            column_values(array.as_ref(), &col, &hp).unwrap(),
            vec![Value::BigInt(big), Value::Int(7)]
        );
    }

    #[test]
    fn test_real_and_wrong_layout() {
        let col = ColumnType::new("R", LogicalType::Real);
        let array: ArrayRef = Arc::new(Float64Array::from(vec![1.5]));
        assert_eq!(values(array, &col), vec![Value::Float(1.5)]);

        let wrong: ArrayRef = Arc::new(StringArray::from(vec!["1.5"]));
        assert!(column_values(wrong.as_ref(), &col, &opts()).is_err());
    }

    #[test]
    fn test_decfloat_struct() {
        let col = ColumnType::new("DF", LogicalType::Decfloat);
        let exponent: ArrayRef = Arc::new(Int16Array::from(vec![-2, 3]));
        // 12345 and -1, big-endian two's complement
        let significand: ArrayRef = Arc::new(BinaryArray::from(vec![
            &[0x30u8, 0x39][..],
            &[0xffu8][..],
        ]));
        let array: ArrayRef = Arc::new(StructArray::from(vec![
            (
                Arc::new(Field::new("exponent", DataType::Int16, false)),
                exponent,
            ),
            (
                Arc::new(Field::new("significand", DataType::Binary, false)),
                significand,
            ),
        ]));
        assert_eq!(
            values(array.clone(), &col),
            vec![Value::Float(123.45), Value::Float(-1000.0)]
        );

        let hp = ConvertOptions {
            higher_precision: true,
            ..opts()
        };
        assert_eq!(
            column_values(array.as_ref(), &col, &hp).unwrap()[1],
            Value::Decimal(Decimal::new(-1, -3))
        );
    }

    #[test]
    fn test_date_and_time() {
        let date = ColumnType::new("D", LogicalType::Date);
        let array: ArrayRef = Arc::new(Date32Array::from(vec![19723]));
        assert_eq!(
            values(array, &date),
            vec![Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())]
        );

        let time = ColumnType::new("T", LogicalType::Time).with_scale(3);
        let array: ArrayRef = Arc::new(Int64Array::from(vec![3_600_250]));
        match &values(array, &time)[0] {
            Value::Time(t) => assert_eq!((t.hour(), t.nanosecond()), (1, 250_000_000)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_ntz_scaled_and_struct_agree() {
        let col = ColumnType::new("N", LogicalType::TimestampNtz).with_scale(9);
        let scaled: ArrayRef = Arc::new(Int64Array::from(vec![-1_500_000_000]));
        let epoch: ArrayRef = Arc::new(Int64Array::from(vec![-2]));
        let fraction: ArrayRef = Arc::new(Int32Array::from(vec![500_000_000]));
        let structured: ArrayRef = Arc::new(StructArray::from(vec![
            (Arc::new(Field::new("epoch", DataType::Int64, false)), epoch),
            (
                Arc::new(Field::new("fraction", DataType::Int32, false)),
                fraction,
            ),
        ]));
        let a = values(scaled, &col);
        let b = values(structured, &col);
        assert_eq!(a, b);
        match &a[0] {
            Value::TimestampNtz(ts) => assert_eq!(ts.and_utc().timestamp_millis(), -1500),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_tz_two_field_struct() {
        let col = ColumnType::new("Z", LogicalType::TimestampTz).with_scale(3);
        let epoch: ArrayRef = Arc::new(Int64Array::from(vec![1_700_000_000_123]));
        let tz: ArrayRef = Arc::new(Int32Array::from(vec![1440 + 60]));
        let array: ArrayRef = Arc::new(StructArray::from(vec![
            (Arc::new(Field::new("epoch", DataType::Int64, false)), epoch),
            (Arc::new(Field::new("timezone", DataType::Int32, false)), tz),
        ]));
        match &values(array, &col)[0] {
            Value::Timestamp(ts) => {
                assert_eq!(ts.offset().local_minus_utc(), 3600);
                assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ltz_in_session_location() {
        let col = ColumnType::new("L", LogicalType::TimestampLtz);
        let options = ConvertOptions {
            location: Location::from_session_timezone(Some("+0200")),
            ..opts()
        };
        let array: ArrayRef = Arc::new(Int64Array::from(vec![0]));
        match &column_values(array.as_ref(), &col, &options).unwrap()[0] {
            Value::Timestamp(ts) => assert_eq!(ts.hour(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_binary_text_utf8_policy() {
        let col = ColumnType::new("S", LogicalType::Text);
        let array: ArrayRef = Arc::new(BinaryArray::from(vec![&[b'a', 0xff][..]]));
        assert!(column_values(array.as_ref(), &col, &opts()).is_err());

        let lenient = ConvertOptions {
            validate_utf8: true,
            ..opts()
        };
        assert_eq!(
            column_values(array.as_ref(), &col, &lenient).unwrap(),
            vec![Value::Text("a\u{FFFD}".into())]
        );
    }

    #[test]
    fn test_structured_array_column() {
        let element = ColumnType::new("", LogicalType::Fixed);
        let col = ColumnType::new("A", LogicalType::Array).with_fields(vec![element]);
        let field = Arc::new(Field::new("item", DataType::Int64, true));
        let array: ArrayRef = Arc::new(ListArray::new(
            field,
            OffsetBuffer::new(ScalarBuffer::from(vec![0, 2, 2, 3])),
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Some(NullBuffer::from(vec![true, false, true])),
        ));
        assert_eq!(
            values(array, &col),
            vec![
                Value::Array(vec![Value::Int(1), Value::Int(2)]),
                Value::Null,
                Value::Array(vec![Value::Int(3)]),
            ]
        );
    }

    #[test]
    fn test_structured_object_column() {
        let col = ColumnType::new("O", LogicalType::Object).with_fields(vec![
            ColumnType::new("city", LogicalType::Text),
            ColumnType::new("zip", LogicalType::Fixed),
        ]);
        let city: ArrayRef = Arc::new(StringArray::from(vec!["Oslo"]));
        let zip: ArrayRef = Arc::new(Int64Array::from(vec![150]));
        let array: ArrayRef = Arc::new(StructArray::from(vec![
            (Arc::new(Field::new("city", DataType::Utf8, true)), city),
            (Arc::new(Field::new("zip", DataType::Int64, true)), zip),
        ]));
        assert_eq!(
            values(array, &col),
            vec![Value::Object(vec![
                ("city".into(), Value::Text("Oslo".into())),
                ("zip".into(), Value::Int(150)),
            ])]
        );
    }

    #[test]
    fn test_structured_map_column() {
        let col = ColumnType::new("M", LogicalType::Map).with_fields(vec![
            ColumnType::new("key", LogicalType::Text),
            ColumnType::new("value", LogicalType::Fixed),
        ]);
        let mut builder = MapBuilder::new(None, StringBuilder::new(), Int64Builder::new());
        builder.keys().append_value("a");
        builder.values().append_value(1);
        builder.append(true).unwrap();
        let array: ArrayRef = Arc::new(builder.finish());
        assert_eq!(
            values(array, &col),
            vec![Value::Map(vec![(Value::Text("a".into()), Value::Int(1))])]
        );
    }

    #[test]
    fn test_semi_structured_as_text() {
        let col = ColumnType::new("V", LogicalType::Object);
        let array: ArrayRef = Arc::new(StringArray::from(vec!["{\"k\":1}"]));
        assert_eq!(values(array, &col), vec![Value::Text("{\"k\":1}".into())]);
    }

    #[test]
    fn test_unknown_type_is_decode_error() {
        let col = ColumnType::from_type_name("G", "geography");
        let array: ArrayRef = Arc::new(StringArray::from(vec!["POINT(1 2)"]));
        let err = column_values(array.as_ref(), &col, &opts()).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("column 'G'"));

        let nulls: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>, None]));
        assert_eq!(values(nulls, &col), vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_batch_to_rows_checks_width() {
        let schema = Arc::new(Schema::new(Fields::from(vec![Field::new(
            "A",
            DataType::Int64,
            true,
        )])));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        let one = RowType::new(vec![ColumnType::new("A", LogicalType::Fixed)]);
        assert_eq!(
            batch_to_rows(&batch, &one, &opts()).unwrap(),
            vec![vec![Value::Int(1)], vec![Value::Int(2)]]
        );

        let two = RowType::new(vec![
            ColumnType::new("A", LogicalType::Fixed),
            ColumnType::new("B", LogicalType::Text),
        ]);
        assert!(batch_to_rows(&batch, &two, &opts()).is_err());
    }

    #[test]
    fn test_signed_be_bytes() {
        assert_eq!(signed_be_bytes(&[]).unwrap(), 0);
        assert_eq!(signed_be_bytes(&[0x01, 0x00]).unwrap(), 256);
        assert_eq!(signed_be_bytes(&[0xff, 0xfe]).unwrap(), -2);
        assert!(signed_be_bytes(&[0u8; 17]).is_err());
    }
}
