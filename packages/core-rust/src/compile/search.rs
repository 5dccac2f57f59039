//! Search field compilation and filter construction.
//!
//! Each compiled editor field maps, by widget kind, to a fixed ordered list of
//! operators. A [`SearchField`] holds the user's current operator and values
//! and turns them into one document-filter constraint.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::compile::field::{EditorField, WidgetKind};
use crate::schema::value_label;

/// Comparison offered by a search field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchOperator {
    Equals,
    NotEquals,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Contains,
    NotContains,
    InRange,
    InSet,
    NotInSet,
}

use SearchOperator::{
    Contains, Equals, Greater, GreaterOrEqual, InRange, InSet, Less, LessOrEqual, NotContains,
    NotEquals, NotInSet,
};

const BOOLEAN_OPERATORS: &[SearchOperator] = &[Equals, NotEquals];
const NUMERIC_OPERATORS: &[SearchOperator] = &[
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equals,
    NotEquals,
    InRange,
];
const TEXT_OPERATORS: &[SearchOperator] = &[Contains, NotContains];
const DATE_OPERATORS: &[SearchOperator] = &[
    InRange,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equals,
    NotEquals,
];
const SET_OPERATORS: &[SearchOperator] = &[InSet, NotInSet];

/// Operators available for a widget, in presentation order.
///
/// Empty for widgets excluded from search.
#[must_use]
pub fn operators_for(widget: WidgetKind) -> &'static [SearchOperator] {
    match widget {
        WidgetKind::Checkbox => BOOLEAN_OPERATORS,
        WidgetKind::Number | WidgetKind::NumberList => NUMERIC_OPERATORS,
        WidgetKind::Text | WidgetKind::MultilineText | WidgetKind::TagList => TEXT_OPERATORS,
        WidgetKind::Date | WidgetKind::DateList => DATE_OPERATORS,
        WidgetKind::ReferencePicker | WidgetKind::EnumPickerList | WidgetKind::EnumPickerInline => {
            SET_OPERATORS
        }
        WidgetKind::FilePicker
        | WidgetKind::ImagePicker
        | WidgetKind::MultiImagePicker
        | WidgetKind::MultiFilePicker
        | WidgetKind::NestedGroup
        | WidgetKind::NestedList => &[],
    }
}

/// One search input with its current operator and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub path: String,
    pub name: String,
    /// Input configuration, relaxed to optional and clearable.
    pub field: EditorField,
    pub operators: Vec<SearchOperator>,
    pub operator: SearchOperator,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value1: Option<Value>,
    /// Upper bound, used by [`SearchOperator::InRange`] only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value2: Option<Value>,
}

impl SearchField {
    /// Active iff `value1` is set and, when a list, non-empty.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match &self.value1 {
            None | Some(Value::Null) => false,
            Some(Value::Array(values)) => !values.is_empty(),
            Some(_) => true,
        }
    }

    /// Switches the operator. Returns `false` if it is not offered for this field.
    pub fn set_operator(&mut self, operator: SearchOperator) -> bool {
        if !self.operators.contains(&operator) {
            return false;
        }
        self.operator = operator;
        if operator != InRange {
            self.value2 = None;
        }
        true
    }

    pub fn clear(&mut self) {
        self.value1 = None;
        self.value2 = None;
    }

    /// Filter constraint for the field's path, `None` while inactive.
    #[must_use]
    pub fn to_filter(&self) -> Option<Value> {
        if !self.is_active() {
            return None;
        }
        let value = self.value1.clone()?;
        let constraint = match self.operator {
            Contains => substring_match(&value),
            NotContains => json!({ "$not": substring_match(&value) }),
            InRange => {
                let mut range = Map::new();
                range.insert("$gte".to_string(), value);
                if let Some(upper) = self.value2.clone().filter(|v| !v.is_null()) {
                    range.insert("$lte".to_string(), upper);
                }
                Value::Object(range)
            }
            Equals => value,
            NotEquals => json!({ "$ne": value }),
            Less => json!({ "$lt": value }),
            Greater => json!({ "$gt": value }),
            LessOrEqual => json!({ "$lte": value }),
            GreaterOrEqual => json!({ "$gte": value }),
            InSet => json!({ "$in": as_list(value) }),
            NotInSet => json!({ "$nin": as_list(value) }),
        };
        Some(constraint)
    }
}

fn substring_match(value: &Value) -> Value {
    json!({ "$regex": regex::escape(&value_label(value)), "$options": "i" })
}

fn as_list(value: Value) -> Value {
    match value {
        Value::Array(_) => value,
        other => Value::Array(vec![other]),
    }
}

/// Combines the constraints of every active search field, keyed by path.
#[must_use]
pub fn build_search_filter(fields: &[SearchField]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|f| f.to_filter().map(|c| (f.path.clone(), c)))
        .collect()
}

// ---------------------------------------------------------------------------
// SearchCompiler
// ---------------------------------------------------------------------------

/// Derives search fields from compiled editor fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchCompiler;

impl SearchCompiler {
    /// Nested groups contribute their inner fields; nested lists, pickers of
    /// files, and fields marked not searchable contribute nothing.
    #[must_use]
    pub fn compile(&self, fields: &[EditorField]) -> Vec<SearchField> {
        let mut out = Vec::new();
        for field in fields {
            self.collect(field, &mut out);
        }
        out
    }

    fn collect(&self, field: &EditorField, out: &mut Vec<SearchField>) {
        if !field.searchable {
            return;
        }
        if field.widget == WidgetKind::NestedGroup {
            for inner in &field.inner_fields {
                self.collect(inner, out);
            }
            return;
        }
        let operators = operators_for(field.widget);
        let Some(&first) = operators.first() else {
            return;
        };

        let mut input = field.clone();
        input.validation.required = false;
        input.read_only = false;
        input.hidden = false;
        input.props.insert("clearable".to_string(), Value::Bool(true));

        out.push(SearchField {
            path: field.path.clone(),
            name: field.name.clone(),
            field: input,
            operators: operators.to_vec(),
            operator: first,
            value1: None,
            value2: None,
        });
    }
}
