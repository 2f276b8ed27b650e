use std::collections::HashSet;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

use super::validation::ValidationError;
use crate::utils::NonEmptyVec;

/// A presentation definition is a JSON object that describes the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier)
/// requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// Only the members this engine checks are typed; `format` and `submission_requirements` are
/// carried through to the VP Request untouched.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_requirements: Option<Json>,
}

impl PresentationDefinition {
    pub fn new(id: String) -> Self {
        Self {
            id,
            input_descriptors: Vec::new(),
            name: None,
            purpose: None,
            format: None,
            submission_requirements: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_input_descriptor(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        &self.input_descriptors
    }

    /// Check the rules serde cannot express: non-empty identifiers, unique input
    /// descriptor ids, parseable JSONPath expressions and compilable filters.
    pub(crate) fn check(&self, location: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                location: location.to_owned(),
                field: "id".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, descriptor) in self.input_descriptors.iter().enumerate() {
            let location = format!("{location}.input_descriptors[{i}]");
            if descriptor.id.trim().is_empty() {
                errors.push(ValidationError::MissingField {
                    location: location.clone(),
                    field: "id".into(),
                });
            } else if !seen.insert(descriptor.id.as_str()) {
                errors.push(ValidationError::InvalidPayload {
                    location: format!("{location}.id"),
                    reason: format!("duplicate input descriptor id '{}'", descriptor.id),
                });
            }
            errors.extend(descriptor.check(&location));
        }

        errors
    }
}

/// Input Descriptors are objects used to describe the information a Verifier requires of a
/// Holder.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<String>,
}

impl InputDescriptor {
    pub fn new(id: String) -> Self {
        Self {
            id,
            name: None,
            purpose: None,
            format: None,
            constraints: None,
            group: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    fn check(&self, location: &str) -> Vec<ValidationError> {
        let Some(constraints) = &self.constraints else {
            return Vec::new();
        };

        constraints
            .fields
            .iter()
            .flatten()
            .enumerate()
            .flat_map(|(i, field)| field.check(&format!("{location}.constraints.fields[{i}]")))
            .collect()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<ConstraintsField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<ConstraintsLimitDisclosure>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, field: ConstraintsField) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}

impl ConstraintsField {
    pub fn new(path: String) -> Self {
        Self {
            path: NonEmptyVec::new(path),
            id: None,
            purpose: None,
            name: None,
            filter: None,
            optional: None,
        }
    }

    pub fn add_path(mut self, path: String) -> Self {
        self.path.push(path);
        self
    }

    pub fn set_filter(mut self, filter: Json) -> Self {
        self.filter = Some(filter);
        self
    }

    fn check(&self, location: &str) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = self
            .path
            .iter()
            .enumerate()
            .filter_map(|(i, path)| {
                JsonPath::parse(path)
                    .err()
                    .map(|e| ValidationError::InvalidPayload {
                        location: format!("{location}.path[{i}]"),
                        reason: format!("invalid JSONPath '{path}': {e}"),
                    })
            })
            .collect();

        if let Some(filter) = &self.filter {
            if let Err(e) = JSONSchema::compile(filter) {
                errors.push(ValidationError::InvalidPayload {
                    location: format!("{location}.filter"),
                    reason: format!("filter is not a valid JSON Schema: {e}"),
                });
            }
        }

        errors
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintsLimitDisclosure {
    Required,
    Preferred,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_example() {
        let value = json!({
            "id": "36682080-c2ed-4ba6-a4cd-37c86ef2da8c",
            "input_descriptors": [
                {
                    "id": "d05a7f51-ac09-43af-8864-e00f0175f2c7",
                    "format": {
                        "ldp_vc": {
                            "proof_type": ["Ed25519Signature2018"]
                        }
                    },
                    "constraints": {
                        "fields": [
                            {
                                "path": ["$.type"],
                                "filter": {
                                    "type": "string",
                                    "pattern": "IDCardCredential"
                                }
                            }
                        ]
                    }
                }
            ]
        });
        let definition: PresentationDefinition = serde_json::from_value(value.clone()).unwrap();
        assert!(definition.check("pd").is_empty());
        assert_eq!(serde_json::to_value(&definition).unwrap(), value);
    }

    #[test]
    fn empty_input_descriptors_are_accepted() {
        let definition: PresentationDefinition =
            serde_json::from_value(json!({ "id": "x", "input_descriptors": [] })).unwrap();
        assert!(definition.check("pd").is_empty());
    }

    #[test]
    fn duplicate_descriptor_ids_are_reported() {
        let definition = PresentationDefinition::new("pd".into())
            .add_input_descriptor(InputDescriptor::new("card".into()))
            .add_input_descriptor(InputDescriptor::new("card".into()));

        let errors = definition.check("query[0].credentialQuery[0]");
        assert_eq!(
            errors,
            vec![ValidationError::InvalidPayload {
                location: "query[0].credentialQuery[0].input_descriptors[1].id".into(),
                reason: "duplicate input descriptor id 'card'".into(),
            }]
        );
    }

    #[test]
    fn bad_path_and_filter_are_located() {
        let field = ConstraintsField::new("$.credentialSubject.name".into())
            .add_path("$[".into())
            .set_filter(json!({ "type": 12 }));
        let definition = PresentationDefinition::new("pd".into()).add_input_descriptor(
            InputDescriptor::new("card".into()).set_constraints(Constraints::new().add_field(field)),
        );

        let locations: Vec<_> = definition
            .check("q")
            .into_iter()
            .map(|e| e.location().to_owned())
            .collect();
        assert_eq!(
            locations,
            vec![
                "q.input_descriptors[0].constraints.fields[0].path[1]",
                "q.input_descriptors[0].constraints.fields[0].filter",
            ]
        );
    }

    #[test]
    fn blank_ids_are_missing_fields() {
        let definition =
            PresentationDefinition::new(" ".into()).add_input_descriptor(InputDescriptor::new("".into()));
        assert_eq!(definition.check("q").len(), 2);
    }
}
