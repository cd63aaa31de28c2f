// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use serde::Serialize;

use crate::model::IndexStats;
use crate::model::SearchResult;
use crate::model::SearchResultItem;

#[derive(Debug, Clone, Serialize)]
pub struct QueryOut {
    pub text: String,
    pub locale: String,
    pub roles: Vec<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOut {
    pub locale: String,
    /// `rebuilt`, `current`, `failed`, `deleted`, or `absent`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOut {
    pub fn from_update(locale: &str, result: &Result<Option<usize>>) -> Self {
        let (status, documents, error) = match result {
            Ok(Some(docs)) => ("rebuilt", Some(*docs), None),
            Ok(None) => ("current", None, None),
            Err(err) => ("failed", None, Some(format!("{err:#}"))),
        };
        Self {
            locale: locale.to_string(),
            status: status.to_string(),
            documents,
            error,
        }
    }

    pub fn from_delete(locale: &str, existed: bool) -> Self {
        Self {
            locale: locale.to_string(),
            status: if existed { "deleted" } else { "absent" }.to_string(),
            documents: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_approx: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResultItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<Vec<UpdateOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<IndexStats>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, text: &str, locale: &str, roles: &[String], limit: usize) -> Self {
        self.query = Some(QueryOut {
            text: text.to_string(),
            locale: locale.to_string(),
            roles: roles.to_vec(),
            limit,
        });
        self
    }

    pub fn with_search(mut self, result: SearchResult) -> Self {
        self.total_approx = Some(result.total_approx);
        self.results = Some(result.items);
        self
    }

    pub fn with_updates(mut self, updates: Vec<UpdateOut>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn with_indexes(mut self, indexes: Vec<IndexStats>) -> Self {
        self.indexes = Some(indexes);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}

pub fn print_results(result: &SearchResult) {
    println!("{} result(s) (approximate)", result.total_approx);
    for (idx, item) in result.items.iter().enumerate() {
        println!("{:>3}. {}  [{}]", idx + 1, item.title, item.id);
        if !item.roles.is_empty() {
            println!("     roles: {}", item.roles.join(", "));
        }
        if !item.snippet.is_empty() {
            println!("     {}", item.snippet);
        }
    }
}

pub fn print_updates(updates: &[UpdateOut]) {
    for update in updates {
        match (update.status.as_str(), update.documents, &update.error) {
            ("rebuilt", Some(docs), _) => println!("{}: rebuilt ({docs} docs)", update.locale),
            (_, _, Some(error)) => println!("{}: {} ({error})", update.locale, update.status),
            (status, _, _) => println!("{}: {status}", update.locale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_shape() -> Result<()> {
        let value = serde_json::to_value(JsonResponse::error("error", "boom"))?;
        assert_eq!(
            value,
            serde_json::json!({
                "ok": false,
                "schema_version": "1",
                "error": {"code": "error", "message": "boom"}
            })
        );
        Ok(())
    }

    #[test]
    fn update_statuses() {
        let failed = UpdateOut::from_update("de", &Err(anyhow::anyhow!("upstream down")));
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error.as_deref(), Some("upstream down"));
        assert_eq!(UpdateOut::from_update("en", &Ok(Some(9))).documents, Some(9));
        assert_eq!(UpdateOut::from_update("en", &Ok(None)).status, "current");
        assert_eq!(UpdateOut::from_delete("en", false).status, "absent");
    }
}
