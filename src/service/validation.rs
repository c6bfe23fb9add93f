//! Request validation from catalog rules.

use crate::config::{ResourceDescriptor, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body: every required field must be present and non-null.
    pub fn validate(body: &Map<String, Value>, resource: &ResourceDescriptor) -> Result<(), AppError> {
        let mut problems = Vec::new();
        for field in resource.fields.iter().filter(|f| !f.generated) {
            let rule = &field.validation;
            match body.get(&field.name) {
                None | Some(Value::Null) if rule.required == Some(true) && field.default.is_none() => {
                    problems.push(format!("{} is required", field.name));
                }
                Some(v) => problems.extend(validate_field(&field.name, v, rule)),
                None => {}
            }
        }
        finish(problems)
    }

    /// Validate only the fields present in body (for PATCH). Required fields may not be nulled.
    pub fn validate_partial(body: &Map<String, Value>, resource: &ResourceDescriptor) -> Result<(), AppError> {
        let mut problems = Vec::new();
        for field in resource.fields.iter().filter(|f| !f.generated) {
            let Some(v) = body.get(&field.name) else {
                continue;
            };
            if v.is_null() && field.validation.required == Some(true) {
                problems.push(format!("{} is required", field.name));
                continue;
            }
            problems.extend(validate_field(&field.name, v, &field.validation));
        }
        finish(problems)
    }
}

fn finish(problems: Vec<String>) -> Result<(), AppError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid input data. {}", problems.join(". "))))
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Option<String> {
    if v.is_null() {
        return None;
    }
    if let Some(format) = &rule.format {
        if let Some(msg) = validate_format(col, v, format) {
            return Some(msg);
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Some(format!("{} must be at most {} characters", col, max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Some(format!("{} must be at least {} characters", col, min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => return Some(format!("{} does not match required pattern", col)),
                Ok(_) => {}
                Err(_) => return Some(format!("invalid pattern for {}", col)),
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let names: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string()))
                .collect();
            return Some(format!("{} must be one of: {}", col, names.join(", ")));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Some(format!("{} must be at least {}", col, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Some(format!("{} must be at most {}", col, max));
            }
        }
    }
    None
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map(|(user, host)| !user.is_empty() && host.contains('.') && !host.ends_with('.'))
                .unwrap_or(false);
            (!valid).then(|| "Please provide a valid email".to_string())
        }
        "uuid" => uuid::Uuid::parse_str(s)
            .is_err()
            .then(|| format!("{} must be a valid UUID", col)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResourceKind};
    use serde_json::json;

    fn tours() -> std::sync::Arc<ResourceDescriptor> {
        resolve(&builtin_config().unwrap()).unwrap().get(ResourceKind::Tours).clone()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn complete() -> Value {
        json!({
            "name": "The Forest Hiker", "duration": 5, "maxGroupSize": 25, "difficulty": "easy",
            "price": 397, "summary": "Breathtaking hike", "imageCover": "tour-1-cover.jpg"
        })
    }

    #[test]
    fn complete_body_passes() {
        assert!(RequestValidator::validate(&body(complete()), &tours()).is_ok());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let err = RequestValidator::validate(&body(json!({"name": "The Forest Hiker"})), &tours()).unwrap_err();
        let AppError::Validation(msg) = err else { panic!("expected validation error") };
        assert!(msg.starts_with("Invalid input data."));
        assert!(msg.contains("duration is required"));
        assert!(msg.contains("imageCover is required"));
    }

    #[test]
    fn rules_apply_to_present_fields() {
        let mut b = complete();
        b["difficulty"] = json!("extreme");
        b["name"] = json!("Short");
        b["ratingsAverage"] = json!(6);
        let AppError::Validation(msg) = RequestValidator::validate(&body(b), &tours()).unwrap_err() else {
            panic!("expected validation error")
        };
        assert!(msg.contains("difficulty must be one of: easy, medium, difficult"));
        assert!(msg.contains("name must be at least 10 characters"));
        assert!(msg.contains("ratingsAverage must be at most 5"));
    }

    #[test]
    fn partial_checks_only_present_fields() {
        assert!(RequestValidator::validate_partial(&body(json!({"price": 10})), &tours()).is_ok());
        assert!(RequestValidator::validate_partial(&body(json!({"price": -1})), &tours()).is_err());
        assert!(RequestValidator::validate_partial(&body(json!({"summary": null})), &tours()).is_err());
    }

    #[test]
    fn email_format() {
        let users = resolve(&builtin_config().unwrap()).unwrap().get(ResourceKind::Users).clone();
        let ok = body(json!({"name": "Ann", "email": "ann@example.com"}));
        assert!(RequestValidator::validate(&ok, &users).is_ok());
        let bad = body(json!({"name": "Ann", "email": "ann@example"}));
        assert!(RequestValidator::validate(&bad, &users).is_err());
    }
}
