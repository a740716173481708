use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

/// Identity metadata stored for each known face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub name: String,
    pub major: String,
    pub year: String,
}

impl StudentRecord {
    /// The persisted result line. The trailing comma is part of the format.
    pub fn result_line(&self) -> String {
        format!("{},{},{},", self.name, self.major, self.year)
    }
}

/// Read-only lookup of student records by exact name.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn get(&self, name: &str) -> anyhow::Result<Option<StudentRecord>>;
}

#[derive(Debug, Clone)]
pub struct DynamoStudentDirectory {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoStudentDirectory {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl StudentDirectory for DynamoStudentDirectory {
    #[tracing::instrument(skip(self))]
    async fn get(&self, name: &str) -> anyhow::Result<Option<StudentRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("name", AttributeValue::S(name.to_string()))
            .send()
            .await
            .context(format!("failed to get {name} from DynamoDB"))?;

        output.item.map(|item| record_from_item(&item)).transpose()
    }
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> anyhow::Result<StudentRecord> {
    Ok(StudentRecord {
        name: text_attribute(item, "name")?,
        major: text_attribute(item, "major")?,
        year: text_attribute(item, "year")?,
    })
}

// years are stored as either strings or numbers depending on who loaded the table
fn text_attribute(item: &HashMap<String, AttributeValue>, field: &str) -> anyhow::Result<String> {
    match item.get(field) {
        Some(AttributeValue::S(value)) | Some(AttributeValue::N(value)) => Ok(value.clone()),
        Some(other) => Err(anyhow::anyhow!(
            "Invalid {field} value in DynamoDB response: {other:?}"
        )),
        None => Err(anyhow::anyhow!("Missing {field} in DynamoDB response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::operation::get_item::GetItemOutput;
    use aws_smithy_mocks::{mock, mock_client};

    fn item(fields: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_result_line_keeps_trailing_comma() {
        let record = StudentRecord {
            name: "Alice".to_string(),
            major: "CS".to_string(),
            year: "2025".to_string(),
        };
        assert_eq!(record.result_line(), "Alice,CS,2025,");
    }

    #[test]
    fn test_numeric_year_is_accepted() {
        let record = record_from_item(&item(&[
            ("name", AttributeValue::S("Bob".into())),
            ("major", AttributeValue::S("Math".into())),
            ("year", AttributeValue::N("2024".into())),
        ]))
        .unwrap();
        assert_eq!(record.year, "2024");
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let err = record_from_item(&item(&[
            ("name", AttributeValue::S("Bob".into())),
            ("year", AttributeValue::N("2024".into())),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("major"));
    }

    #[tokio::test]
    async fn test_get_existing_record() {
        let get_item_rule = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(|req| {
                req.table_name() == Some("student_data")
                    && req.key().and_then(|k| k.get("name"))
                        == Some(&AttributeValue::S("Alice".to_string()))
            })
            .then_output(|| {
                GetItemOutput::builder()
                    .set_item(Some(item(&[
                        ("name", AttributeValue::S("Alice".into())),
                        ("major", AttributeValue::S("CS".into())),
                        ("year", AttributeValue::S("2025".into())),
                    ])))
                    .build()
            });
        let client = mock_client!(aws_sdk_dynamodb, [&get_item_rule]);
        let directory = DynamoStudentDirectory::new(client, "student_data");

        let record = directory.get("Alice").await.unwrap();

        assert_eq!(get_item_rule.num_calls(), 1);
        assert_eq!(
            record,
            Some(StudentRecord {
                name: "Alice".to_string(),
                major: "CS".to_string(),
                year: "2025".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_get_absent_record() {
        let get_item_rule = mock!(aws_sdk_dynamodb::Client::get_item)
            .then_output(|| GetItemOutput::builder().build());
        let client = mock_client!(aws_sdk_dynamodb, [&get_item_rule]);
        let directory = DynamoStudentDirectory::new(client, "student_data");

        assert_eq!(directory.get("Mallory").await.unwrap(), None);
    }
}
