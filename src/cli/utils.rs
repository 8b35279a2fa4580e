use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_json(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error_json(message, error_code))?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

fn success_json(message: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": true,
        "message": message
    });

    if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
        target.extend(extra);
    }

    response
}

fn error_json(message: &str, error_code: Option<&str>) -> Value {
    let mut response = json!({
        "success": false,
        "error": message
    });

    if let Some(code) = error_code {
        response["error_code"] = json!(code);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_json_merges_object_data() {
        let value = success_json("done", Some(json!({ "status": "success", "count": 2 })));
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "done");
        assert_eq!(value["count"], 2);
    }

    #[test]
    fn success_json_ignores_non_object_data() {
        let value = success_json("done", Some(json!([1, 2])));
        assert_eq!(value, json!({ "success": true, "message": "done" }));
    }

    #[test]
    fn error_json_carries_code() {
        let value = error_json("nope", Some("UPLOAD_FAILED"));
        assert_eq!(value["error"], "nope");
        assert_eq!(value["error_code"], "UPLOAD_FAILED");
    }
}
