//! Catalog validation: referential integrity and query consistency.

use crate::config::resolved::{ResourceKind, CREATED_AT_FIELD, ID_FIELD};
use crate::config::{CatalogConfig, FieldKind, ResourceConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for r in &config.resources {
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicateName(r.name.clone()));
        }
    }
    for kind in ResourceKind::ALL {
        if !names.contains(kind.name()) {
            return Err(ConfigError::MissingReference {
                kind: "resource",
                id: kind.name().to_string(),
            });
        }
    }

    let fields_by_resource: HashMap<&str, HashMap<&str, FieldKind>> = config
        .resources
        .iter()
        .map(|r| {
            let mut fields: HashMap<&str, FieldKind> = r.fields.iter().map(|f| (f.name.as_str(), f.kind)).collect();
            fields.insert(ID_FIELD, FieldKind::Uuid);
            fields.insert(CREATED_AT_FIELD, FieldKind::Timestamp);
            (r.name.as_str(), fields)
        })
        .collect();

    for r in &config.resources {
        validate_resource(r, &fields_by_resource)?;
    }
    Ok(())
}

fn validate_resource(
    r: &ResourceConfig,
    fields_by_resource: &HashMap<&str, HashMap<&str, FieldKind>>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for f in &r.fields {
        if f.name == ID_FIELD || f.name == CREATED_AT_FIELD {
            return Err(ConfigError::Validation(format!(
                "{}: '{}' is generated and must not be declared",
                r.name, f.name
            )));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(ConfigError::Validation(format!("{}: duplicate field '{}'", r.name, f.name)));
        }
        if let Some(target) = &f.references {
            if !fields_by_resource.contains_key(target.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "resource",
                    id: target.clone(),
                });
            }
        }
        if let Some(pattern) = &f.validation.pattern {
            Regex::new(pattern)
                .map_err(|e| ConfigError::Validation(format!("{}.{}: invalid pattern: {}", r.name, f.name, e)))?;
        }
    }

    let own = &fields_by_resource[r.name.as_str()];
    let field_of = |name: &str| -> Result<FieldKind, ConfigError> {
        own.get(name).copied().ok_or_else(|| ConfigError::MissingReference {
            kind: "field",
            id: format!("{}.{}", r.name, name),
        })
    };

    for group in &r.unique_together {
        for name in group {
            field_of(name)?;
        }
    }
    for name in &r.search.fields {
        if field_of(name)? != FieldKind::Text {
            return Err(ConfigError::Validation(format!(
                "{}: search field '{}' must be text",
                r.name, name
            )));
        }
    }
    let sort_field = r.default_sort.trim_start_matches('-');
    if !field_of(sort_field)?.is_scalar() {
        return Err(ConfigError::Validation(format!(
            "{}: default sort '{}' is not sortable",
            r.name, sort_field
        )));
    }
    if let Some(source) = &r.slug_from {
        field_of(source)?;
        field_of("slug")?;
    }

    for e in &r.expand {
        let target = fields_by_resource
            .get(e.resource.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "resource",
                id: e.resource.clone(),
            })?;
        match (&e.local_field, &e.foreign_field) {
            (Some(local), None) => {
                field_of(local)?;
            }
            (None, Some(foreign)) => {
                if !target.contains_key(foreign.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "field",
                        id: format!("{}.{}", e.resource, foreign),
                    });
                }
            }
            _ => {
                return Err(ConfigError::Validation(format!(
                    "{}: expand '{}' needs exactly one of local_field or foreign_field",
                    r.name, e.name
                )))
            }
        }
        for name in &e.fields {
            if !target.contains_key(name.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "field",
                    id: format!("{}.{}", e.resource, name),
                });
            }
        }
    }
    Ok(())
}
