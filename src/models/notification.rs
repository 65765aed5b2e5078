use serde_json::Value;

use crate::models::envelope::{Envelope, FieldError};

const LINE_BREAK: &str = "<br>";

/// The closed set of event shapes that produce a chat notification.
/// Everything outside it classifies as `Unrecognized` and renders no card.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ContractUpdate {
        is_new_contract: bool,
        contract_id: i64,
        ledger_identifier: String,
        block_id: i64,
        block_hash: String,
    },
    ApplicationIngestion {
        application_name: String,
        application_id: i64,
        application_version: String,
        definition_location: String,
    },
    RoleAssignment {
        application_name: String,
        application_id: i64,
        application_version: String,
        role: ApplicationRole,
    },
    FunctionInvocation {
        contract_id: i64,
        ledger_identifier: String,
        function_name: String,
    },
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRole {
    pub id: i64,
    pub name: String,
}

/// What the dispatcher sends: a thumbnail-card title plus a formatted body.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub text: String,
}

impl Notification {
    /// Discriminates on `MessageName`, then on `EventName` for event
    /// messages, both case-insensitively. Combinations outside the closed
    /// set yield `Unrecognized`; a matched variant with a missing or
    /// mis-shaped required field is a `FieldError`.
    pub fn classify(envelope: &Envelope) -> Result<Self, FieldError> {
        let message_name = envelope.message_name();

        if message_name.eq_ignore_ascii_case("ContractMessage") {
            return Ok(Self::ContractUpdate {
                is_new_contract: envelope.boolean("IsNewContract")?,
                contract_id: envelope.integer("ContractId")?,
                ledger_identifier: envelope.string("ContractLedgerIdentifier")?.to_string(),
                block_id: envelope.integer("BlockId")?,
                block_hash: envelope.string("BlockHash")?.to_string(),
            });
        }

        if !message_name.eq_ignore_ascii_case("EventMessage") {
            return Ok(Self::Unrecognized);
        }

        // EventName is a discriminator, not payload: when it is absent or
        // not a string there is nothing to match, which is Unrecognized
        // rather than a field error.
        let Some(event_name) = envelope.optional_string("EventName") else {
            return Ok(Self::Unrecognized);
        };

        if event_name.eq_ignore_ascii_case("ApplicationIngestion") {
            Ok(Self::ApplicationIngestion {
                application_name: envelope.string("ApplicationName")?.to_string(),
                application_id: envelope.integer("ApplicationId")?,
                application_version: envelope.string("ApplicationVersion")?.to_string(),
                definition_location: envelope.string("ApplicationDefinitionLocation")?.to_string(),
            })
        } else if event_name.eq_ignore_ascii_case("RoleAssignment") {
            Ok(Self::RoleAssignment {
                application_name: envelope.string("ApplicationName")?.to_string(),
                application_id: envelope.integer("ApplicationId")?,
                application_version: envelope.string("ApplicationVersion")?.to_string(),
                role: ApplicationRole::extract(envelope)?,
            })
        } else if event_name.eq_ignore_ascii_case("ContractFunctionInvocation") {
            let function_name = match envelope.optional_string("FunctionName") {
                Some(name) if !name.trim().is_empty() => name.to_string(),
                _ => "constructor".to_string(),
            };

            Ok(Self::FunctionInvocation {
                contract_id: envelope.integer("ContractId")?,
                ledger_identifier: envelope.string("ContractLedgerIdentifier")?.to_string(),
                function_name,
            })
        } else {
            Ok(Self::Unrecognized)
        }
    }

    /// Renders the variant's card. `Unrecognized` produces none: the caller
    /// skips dispatch but still acknowledges the message.
    pub fn render(&self) -> Option<Card> {
        match self {
            Self::ContractUpdate {
                is_new_contract,
                contract_id,
                ledger_identifier,
                block_id,
                block_hash,
            } => {
                let title = if *is_new_contract {
                    "New Contract Created"
                } else {
                    "Contract Updated"
                };

                Some(Card {
                    title: title.to_string(),
                    text: body(&[
                        ("Contract Id", contract_id.to_string()),
                        ("Contract Ledger Identifier", ledger_identifier.clone()),
                        ("Block Id", block_id.to_string()),
                        ("Block Hash", block_hash.clone()),
                    ]),
                })
            }
            Self::ApplicationIngestion {
                application_name,
                application_id,
                application_version,
                definition_location,
            } => Some(Card {
                title: "New Application Uploaded".to_string(),
                text: body(&[
                    ("Application Name", application_name.clone()),
                    ("Application Id", application_id.to_string()),
                    ("Application Version", application_version.clone()),
                    (
                        "Application Definition Location",
                        hyperlink(definition_location, "View Application"),
                    ),
                ]),
            }),
            Self::RoleAssignment {
                application_name,
                application_id,
                application_version,
                role,
            } => Some(Card {
                title: "New Role Assigned".to_string(),
                text: body(&[
                    ("Application Name", application_name.clone()),
                    ("Application Id", application_id.to_string()),
                    ("Application Version", application_version.clone()),
                    ("Application Role Name", role.name.clone()),
                ]),
            }),
            Self::FunctionInvocation {
                contract_id,
                ledger_identifier,
                function_name,
            } => Some(Card {
                title: "Contract Function Invocated".to_string(),
                text: body(&[
                    ("Contract Id", contract_id.to_string()),
                    ("Contract Ledger Identifier", ledger_identifier.clone()),
                    ("Function", function_name.clone()),
                ]),
            }),
            Self::Unrecognized => None,
        }
    }
}

impl ApplicationRole {
    fn extract(envelope: &Envelope) -> Result<Self, FieldError> {
        let role = envelope.object("ApplicationRole")?;

        let id = required(role, "Id", "ApplicationRole.Id")?
            .as_i64()
            .ok_or(FieldError::WrongShape("ApplicationRole.Id", "integer"))?;

        let name = required(role, "Name", "ApplicationRole.Name")?
            .as_str()
            .ok_or(FieldError::WrongShape("ApplicationRole.Name", "string"))?
            .to_string();

        Ok(Self { id, name })
    }
}

/// Labeled field/value pairs in fixed order, one per line, with a trailing
/// blank line.
fn body(pairs: &[(&str, String)]) -> String {
    let mut text = String::new();
    for (label, value) in pairs {
        text.push_str(label);
        text.push_str(" : ");
        text.push_str(value);
        text.push_str(LINE_BREAK);
    }
    text.push_str(LINE_BREAK);
    text
}

fn hyperlink(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", href, label)
}

fn required<'a>(
    object: &'a serde_json::Map<String, Value>,
    key: &str,
    qualified: &'static str,
) -> Result<&'a Value, FieldError> {
    match object.get(key) {
        Some(Value::Null) | None => Err(FieldError::Missing(qualified)),
        Some(value) => Ok(value),
    }
}
