use crate::assertion::types::{AssertError, AssertValue, ValuePath};
use crate::http::Response;
use crate::variable::{ExtractError, PathExpr};

/// 从响应中提取值
pub fn extract_value(response: &Response, path: &ValuePath) -> Result<AssertValue, AssertError> {
    match path {
        ValuePath::Status => Ok(AssertValue::Number(response.status.code() as f64)),

        ValuePath::Header(name) => {
            let value = response
                .headers
                .get(name.as_str())
                .ok_or_else(|| AssertError::PathNotFound(format!("Header '{}' not found", name)))?;
            Ok(AssertValue::String(
                value
                    .to_str()
                    .map_err(|e| {
                        AssertError::ExtractionError(format!(
                            "Failed to convert header value to string: {}",
                            e
                        ))
                    })?
                    .to_string(),
            ))
        }

        ValuePath::Body(expr) => extract_from_body(&response.body, expr),

        ValuePath::ResponseTime => Ok(AssertValue::Number(response.duration.as_millis() as f64)),
    }
}

/// 从 body 中提取值；整个 body 不是 JSON 时按原始文本处理
fn extract_from_body(body: &str, expr: &PathExpr) -> Result<AssertValue, AssertError> {
    let json_value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if expr.is_root() => return Ok(AssertValue::String(body.to_string())),
        Err(e) => {
            return Err(AssertError::ExtractionError(format!(
                "Response body is not JSON: {}",
                e
            )));
        }
    };

    let value = expr.evaluate(&json_value).map_err(|e| match e {
        ExtractError::PathNotFound(_) => {
            AssertError::PathNotFound(format!("Path 'body.{}' not found", expr))
        }
        other => AssertError::ExtractionError(other.to_string()),
    })?;

    AssertValue::from_json(value)
}
