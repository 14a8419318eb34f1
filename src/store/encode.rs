use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Serializes any serde value as 2-space indented JSON with a trailing newline.
///
/// Integers and floats of every width, sequences and maps go through serde's
/// data model, so they land as plain JSON numbers, arrays and objects.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(4096);
    let mut ser =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"  "));
    value.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timepoint::SampleTime;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Mixed {
        small: u8,
        signed: i16,
        wide: u64,
        neg: i64,
        single: f32,
        double: f64,
        samples: Vec<u32>,
        grid: [[i8; 2]; 2],
        nested: BTreeMap<String, BTreeMap<String, f64>>,
        at: SampleTime,
    }

    #[test]
    fn native_numbers_become_plain_json() {
        let mut inner = BTreeMap::new();
        inner.insert("draw".to_string(), 35.5);
        let mut nested = BTreeMap::new();
        nested.insert("0".to_string(), inner);

        let value = Mixed {
            small: 7,
            signed: -300,
            wide: u64::MAX,
            neg: i64::MIN,
            single: 0.5,
            double: 1e-3,
            samples: vec![1, 2, 3],
            grid: [[1, -1], [0, 2]],
            nested,
            at: "12-31-2024_23-59-59".parse().unwrap(),
        };

        let bytes = to_pretty_json(&value).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            parsed,
            json!({
                "small": 7,
                "signed": -300,
                "wide": u64::MAX,
                "neg": i64::MIN,
                "single": 0.5,
                "double": 0.001,
                "samples": [1, 2, 3],
                "grid": [[1, -1], [0, 2]],
                "nested": {"0": {"draw": 35.5}},
                "at": "12-31-2024_23-59-59"
            })
        );
        assert_eq!(parsed["wide"].as_u64(), Some(u64::MAX));
        assert_eq!(parsed["neg"].as_i64(), Some(i64::MIN));
    }

    #[test]
    fn output_is_indented_with_two_spaces() {
        let mut map = BTreeMap::new();
        map.insert("a", 1);
        let text = String::from_utf8(to_pretty_json(&map).unwrap()).unwrap();
        assert_eq!(text, "{\n  \"a\": 1\n}\n");
    }
}
