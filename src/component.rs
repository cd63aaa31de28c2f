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

//! Typed component tree for content documents.
//!
//! Every node in a content document carries a `component` discriminator. The
//! [`ComponentRegistry`] maps each discriminator to a constructor producing a
//! [`Component`] variant; new component types are added by registering a
//! constructor, never by editing the existing cases.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Page { children: Vec<Component> },
    Section { children: Vec<Component> },
    Grid { left: Vec<Component>, right: Vec<Component> },
    Table(Table),
    /// Rich text authored in markdown.
    Text { markdown: String },
    Teaser { headline: String },
    /// A registered container type whose children are walked in field order.
    Container { kind: String, children: Vec<Component> },
    /// A registered leaf type contributing the text of some of its fields.
    Fields { kind: String, texts: Vec<String> },
    Unknown { kind: String },
}

impl Component {
    pub fn kind(&self) -> &str {
        match self {
            Component::Page { .. } => "page",
            Component::Section { .. } => "section",
            Component::Grid { .. } => "grid_1x1",
            Component::Table(_) => "table",
            Component::Text { .. } => "text",
            Component::Teaser { .. } => "teaser",
            Component::Container { kind, .. } => kind.as_str(),
            Component::Fields { kind, .. } => kind.as_str(),
            Component::Unknown { kind } => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

type Constructor = Arc<dyn Fn(&Map<String, Value>, &ComponentRegistry) -> Component + Send + Sync>;

#[derive(Clone)]
pub struct ComponentRegistry {
    constructors: HashMap<String, Constructor>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.constructors.keys().collect();
        kinds.sort();
        f.debug_struct("ComponentRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ComponentRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the component types every site shares.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register("page", |fields, registry| Component::Page {
                children: registry.children(fields, &["body", "content"]),
            })
            .register("section", |fields, registry| Component::Section {
                children: registry.children(fields, &["content", "body"]),
            })
            .register("grid_1x1", |fields, registry| Component::Grid {
                left: registry.children(fields, &["left_column"]),
                right: registry.children(fields, &["right_column"]),
            })
            .register("table", |fields, _| {
                Component::Table(parse_table(fields.get("table")))
            })
            .register("text", |fields, _| Component::Text {
                markdown: first_string(fields, &["content", "text"]),
            })
            .register("teaser", |fields, _| Component::Teaser {
                headline: first_string(fields, &["headline"]),
            });
        registry
    }

    pub fn register<F>(&mut self, kind: &str, constructor: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>, &ComponentRegistry) -> Component + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(constructor));
        self
    }

    /// Registers a container whose children live in `child_fields`, walked in
    /// the given order.
    pub fn register_container(&mut self, kind: &str, child_fields: &[&str]) -> &mut Self {
        let owned_kind = kind.to_string();
        let fields: Vec<String> = child_fields.iter().map(|f| f.to_string()).collect();
        self.register(kind, move |map, registry| {
            let mut children = Vec::new();
            for field in &fields {
                children.extend(registry.list(map.get(field)));
            }
            Component::Container {
                kind: owned_kind.clone(),
                children,
            }
        })
    }

    /// Registers a leaf whose string fields are indexed as text.
    pub fn register_text_fields(&mut self, kind: &str, text_fields: &[&str]) -> &mut Self {
        let owned_kind = kind.to_string();
        let fields: Vec<String> = text_fields.iter().map(|f| f.to_string()).collect();
        self.register(kind, move |map, _| {
            let mut texts = Vec::new();
            for field in &fields {
                match map.get(field) {
                    Some(Value::String(s)) => texts.push(s.clone()),
                    Some(Value::Array(items)) => texts.extend(
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string)),
                    ),
                    _ => {}
                }
            }
            Component::Fields {
                kind: owned_kind.clone(),
                texts,
            }
        })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Parses one node. Nodes without a discriminator or with an unregistered
    /// one become [`Component::Unknown`].
    pub fn parse(&self, value: &Value) -> Component {
        let Some(map) = value.as_object() else {
            return Component::Unknown {
                kind: String::new(),
            };
        };
        let kind = map
            .get("component")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match self.constructors.get(kind) {
            Some(constructor) => constructor(map, self),
            None => Component::Unknown {
                kind: kind.to_string(),
            },
        }
    }

    /// Parses a child list; a single object is treated as a one-element list.
    pub fn list(&self, value: Option<&Value>) -> Vec<Component> {
        match value {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| self.parse(item))
                .collect(),
            Some(item @ Value::Object(_)) => vec![self.parse(item)],
            _ => Vec::new(),
        }
    }

    fn children(&self, fields: &Map<String, Value>, candidates: &[&str]) -> Vec<Component> {
        candidates
            .iter()
            .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
            .map(|value| self.list(Some(value)))
            .unwrap_or_default()
    }
}

fn first_string(fields: &Map<String, Value>, candidates: &[&str]) -> String {
    candidates
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn parse_table(value: Option<&Value>) -> Table {
    let Some(table) = value.and_then(Value::as_object) else {
        return Table::default();
    };
    let header = table
        .get("thead")
        .and_then(Value::as_array)
        .map(|cells| cells.iter().map(cell_value).collect())
        .unwrap_or_default();
    let rows = table
        .get("tbody")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.get("body")
                        .and_then(Value::as_array)
                        .map(|cells| cells.iter().map(cell_value).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();
    Table { header, rows }
}

fn cell_value(cell: &Value) -> String {
    cell.get("value")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
