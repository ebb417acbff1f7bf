use core::fmt::Write;
use heapless::String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// The encoded fields do not fit in the buffer
    Overflow,
    /// A real value is NaN or infinite
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Text(&'a str),
    Int(i32),
    /// Real value printed with `precision` fractional digits
    Real { value: f32, precision: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field<'a> {
    pub key: &'a str,
    pub value: Value<'a>,
}

impl<'a> Field<'a> {
    pub const fn new(key: &'a str, value: Value<'a>) -> Self {
        Self { key, value }
    }
}

/// Fields sent to the reporting service, in wire order
pub fn report_fields(
    api_key: &str,
    temperature: i32,
    humidity: i32,
    field3: f32,
    field4: f32,
) -> [Field<'_>; 5] {
    [
        Field::new("api_key", Value::Text(api_key)),
        Field::new("field1", Value::Int(temperature)),
        Field::new("field2", Value::Int(humidity)),
        Field::new("field3", Value::Real { value: field3, precision: 3 }),
        Field::new("field4", Value::Real { value: field4, precision: 3 }),
    ]
}

#[derive(Debug, Default)]
pub struct QueryBuffer<const N: usize> {
    query: String<N>,
}

impl<const N: usize> QueryBuffer<N> {
    pub fn new() -> Self {
        Self {
            query: String::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.query.as_str()
    }

    /// Replace the buffer contents with the encoded `fields`, returning the
    /// encoded length. On error the previous contents are left untouched.
    pub fn encode(&mut self, fields: &[Field<'_>]) -> Result<usize, QueryError> {
        let mut encoded: String<N> = String::new();

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                encoded.push('&').map_err(|_| QueryError::Overflow)?;
            }
            let written = match field.value {
                Value::Text(text) => write!(encoded, "{}={}", field.key, text),
                Value::Int(value) => write!(encoded, "{}={}", field.key, value),
                Value::Real { value, precision } => {
                    if !value.is_finite() {
                        return Err(QueryError::NonFinite);
                    }
                    write!(encoded, "{}={:.*}", field.key, precision, value)
                }
            };
            written.map_err(|_| QueryError::Overflow)?;
        }

        self.query = encoded;
        Ok(self.query.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'q>(query: &'q str, key: &str) -> Option<&'q str> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn test_report_query_format() {
        let mut buffer = QueryBuffer::<128>::new();
        let len = buffer
            .encode(&report_fields("JNQZ81RODX5LATC5", 24, 60, 0.0, 0.0))
            .unwrap();

        let expected = "api_key=JNQZ81RODX5LATC5&field1=24&field2=60&field3=0.000&field4=0.000";
        assert_eq!(buffer.as_str(), expected);
        assert_eq!(len, expected.len());
    }

    #[test]
    fn test_decoded_fields_match_inputs() {
        let inputs = [(-3, 99, 1.23456f32, 31.6667f32), (40, 0, 0.0004, 12345.678)];
        for (temperature, humidity, field3, field4) in inputs {
            let mut buffer = QueryBuffer::<128>::new();
            buffer
                .encode(&report_fields("KEY", temperature, humidity, field3, field4))
                .unwrap();
            let query = buffer.as_str();

            assert_eq!(lookup(query, "api_key"), Some("KEY"));
            assert_eq!(lookup(query, "field1").unwrap().parse::<i32>().unwrap(), temperature);
            assert_eq!(lookup(query, "field2").unwrap().parse::<i32>().unwrap(), humidity);
            let f3: f32 = lookup(query, "field3").unwrap().parse().unwrap();
            let f4: f32 = lookup(query, "field4").unwrap().parse().unwrap();
            assert!((f3 - field3).abs() <= 0.5e-3);
            assert!((f4 - field4).abs() <= 0.5e-3 + field4.abs() * f32::EPSILON);
        }
    }

    #[test]
    fn test_overflow_leaves_buffer_unchanged() {
        let mut buffer = QueryBuffer::<16>::new();
        let fields = [
            Field::new("api_key", Value::Text("0123456789ABCDEF")),
            Field::new("field1", Value::Int(24)),
            Field::new("field2", Value::Int(60)),
        ];

        assert_eq!(buffer.encode(&fields), Err(QueryError::Overflow));
        assert_eq!(buffer.as_str(), "");

        buffer.encode(&[Field::new("a", Value::Int(1))]).unwrap();
        assert_eq!(buffer.encode(&fields), Err(QueryError::Overflow));
        assert_eq!(buffer.as_str(), "a=1");
    }

    #[test]
    fn test_shorter_encoding_leaves_no_stale_bytes() {
        let mut buffer = QueryBuffer::<128>::new();
        buffer.encode(&report_fields("KEY", 100, 100, 1000.5, 1000.5)).unwrap();
        buffer.encode(&[Field::new("field1", Value::Int(1))]).unwrap();
        assert_eq!(buffer.as_str(), "field1=1");
    }

    #[test]
    fn test_non_finite_real_is_rejected() {
        let mut buffer = QueryBuffer::<64>::new();
        let fields = [Field::new("field3", Value::Real { value: f32::NAN, precision: 3 })];
        assert_eq!(buffer.encode(&fields), Err(QueryError::NonFinite));
    }
}
