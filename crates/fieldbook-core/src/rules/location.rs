use serde_json::{Map, Value};

use super::InputRule;
use crate::codes::ErrorCode;
use crate::definition::Input;

/// `{latitude, longitude, accuracy}`; values may arrive as strings
pub struct LocationRule;

fn coordinate(map: &Map<String, Value>, key: &str) -> Result<Option<f64>, ErrorCode> {
    let value = match map.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => None,
    };
    value
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or(ErrorCode::AnswerLocationInvalid)
}

impl InputRule for LocationRule {
    fn validate(&self, answer: &Value, _input: &Input) -> Result<Value, ErrorCode> {
        let map = answer.as_object().ok_or(ErrorCode::AnswerLocationInvalid)?;

        let (Some(latitude), Some(longitude)) = (coordinate(map, "latitude")?, coordinate(map, "longitude")?) else {
            return Err(ErrorCode::AnswerLocationInvalid);
        };
        let accuracy = coordinate(map, "accuracy")?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ErrorCode::AnswerLocationInvalid);
        }
        if accuracy.map(|a| a < 0.0).unwrap_or(false) {
            return Err(ErrorCode::AnswerLocationInvalid);
        }

        Ok(serde_json::json!({
            "latitude": latitude,
            "longitude": longitude,
            // whole metres are enough
            "accuracy": accuracy.map(|a| a.round() as i64),
        }))
    }
}
