//! 分析框架（控件定义）
//!
//! 框架定义了条目可打的标签控件。每种控件是 [`WidgetKind`] 的一个变体，
//! 取值校验在 [`WidgetKind::validate`] 中统一做穷尽匹配。
//! 控件可以带条件：父控件取值不满足条件时该控件隐藏，隐藏控件的取值不随条目发送。

use crate::tagging::entry::models::{Entry, EntryType, FormError};
use crate::tagging::entry::types::EntryInput;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// 控件类型标识（attribute 上携带的 widgetType）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetType {
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "NUMBER")]
    Number,
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "DATE_RANGE")]
    DateRange,
    #[serde(rename = "TIME_RANGE")]
    TimeRange,
    #[serde(rename = "SCALE")]
    Scale,
    #[serde(rename = "SELECT")]
    Select,
    #[serde(rename = "MULTISELECT")]
    MultiSelect,
    #[serde(rename = "ORGANIGRAM")]
    Organigram,
    #[serde(rename = "GEO")]
    GeoLocation,
    #[serde(rename = "MATRIX1D")]
    Matrix1d,
    #[serde(rename = "MATRIX2D")]
    Matrix2d,
}

/// 选项（单选、多选、刻度等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOption {
    pub key: String,
    pub label: String,
}

/// 矩阵的一行（1D 中为 pillar + cells，2D 中为 pillar + subpillars）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub cells: Vec<WidgetOption>,
}

/// 2D 矩阵的一列（sector + subsectors）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixColumn {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub subcolumns: Vec<WidgetOption>,
}

/// 控件种类及其属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "widgetId", content = "properties")]
pub enum WidgetKind {
    #[serde(rename = "TEXT")]
    Text {
        #[serde(default, rename = "maxLength")]
        max_length: Option<usize>,
    },
    #[serde(rename = "NUMBER")]
    Number {
        #[serde(default, rename = "minValue")]
        min_value: Option<f64>,
        #[serde(default, rename = "maxValue")]
        max_value: Option<f64>,
    },
    #[serde(rename = "DATE")]
    Date,
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "DATE_RANGE")]
    DateRange,
    #[serde(rename = "TIME_RANGE")]
    TimeRange,
    #[serde(rename = "SCALE")]
    Scale { options: Vec<WidgetOption> },
    #[serde(rename = "SELECT")]
    Select { options: Vec<WidgetOption> },
    #[serde(rename = "MULTISELECT")]
    MultiSelect { options: Vec<WidgetOption> },
    #[serde(rename = "ORGANIGRAM")]
    Organigram { options: Vec<WidgetOption> },
    #[serde(rename = "GEO")]
    GeoLocation,
    #[serde(rename = "MATRIX1D")]
    Matrix1d { rows: Vec<MatrixRow> },
    #[serde(rename = "MATRIX2D")]
    Matrix2d {
        rows: Vec<MatrixRow>,
        columns: Vec<MatrixColumn>,
    },
}

/// 控件显示条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetCondition {
    pub parent_widget: String,
    pub operator: ConditionOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    /// 父控件选中了其中任意一个 key
    IncludesAny { values: Vec<String> },
    IsEmpty,
    IsNotEmpty,
}

/// 框架中的一个控件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub kind: WidgetKind,
    #[serde(default)]
    pub condition: Option<WidgetCondition>,
}

/// 分析框架
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Framework {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

fn options_contain(options: &[WidgetOption], key: &str) -> bool {
    options.iter().any(|o| o.key == key)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn as_key_list(value: &Value) -> Result<Vec<String>, String> {
    let items = value.as_array().ok_or_else(|| "应为数组".to_string())?;
    items
        .iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err("数组元素应为字符串".to_string()),
        })
        .collect()
}

/// 控件取值中被选中的 key（用于条件判断）
fn selected_keys(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(_) => as_key_list(value).unwrap_or_default(),
        Value::Object(o) => o
            .iter()
            .filter(|(_, v)| !is_empty_value(v))
            .map(|(k, _)| k.clone())
            .collect(),
        _ => Vec::new(),
    }
}

impl WidgetKind {
    pub fn widget_type(&self) -> WidgetType {
        match self {
            WidgetKind::Text { .. } => WidgetType::Text,
            WidgetKind::Number { .. } => WidgetType::Number,
            WidgetKind::Date => WidgetType::Date,
            WidgetKind::Time => WidgetType::Time,
            WidgetKind::DateRange => WidgetType::DateRange,
            WidgetKind::TimeRange => WidgetType::TimeRange,
            WidgetKind::Scale { .. } => WidgetType::Scale,
            WidgetKind::Select { .. } => WidgetType::Select,
            WidgetKind::MultiSelect { .. } => WidgetType::MultiSelect,
            WidgetKind::Organigram { .. } => WidgetType::Organigram,
            WidgetKind::GeoLocation => WidgetType::GeoLocation,
            WidgetKind::Matrix1d { .. } => WidgetType::Matrix1d,
            WidgetKind::Matrix2d { .. } => WidgetType::Matrix2d,
        }
    }

    /// 校验 attribute.data（形如 `{"value": ...}`）。空值总是合法
    pub fn validate(&self, data: &Value) -> Result<(), String> {
        let value = data.get("value").unwrap_or(&Value::Null);
        if is_empty_value(value) {
            return Ok(());
        }
        match self {
            WidgetKind::Text { max_length } => {
                let text = value.as_str().ok_or("应为文本")?;
                match max_length {
                    Some(max) if text.chars().count() > *max => {
                        Err(format!("长度不能超过 {}", max))
                    }
                    _ => Ok(()),
                }
            }
            WidgetKind::Number {
                min_value,
                max_value,
            } => {
                let n = value.as_f64().ok_or("应为数字")?;
                if let Some(min) = min_value {
                    if n < *min {
                        return Err(format!("不能小于 {}", min));
                    }
                }
                if let Some(max) = max_value {
                    if n > *max {
                        return Err(format!("不能大于 {}", max));
                    }
                }
                Ok(())
            }
            WidgetKind::Date => parse_date(value).map(|_| ()),
            WidgetKind::Time => parse_time(value).map(|_| ()),
            WidgetKind::DateRange => {
                let start = value.get("startDate").map(parse_date).transpose()?;
                let end = value.get("endDate").map(parse_date).transpose()?;
                match (start, end) {
                    (Some(s), Some(e)) if s > e => Err("开始日期不能晚于结束日期".into()),
                    _ => Ok(()),
                }
            }
            WidgetKind::TimeRange => {
                let start = value.get("startTime").map(parse_time).transpose()?;
                let end = value.get("endTime").map(parse_time).transpose()?;
                match (start, end) {
                    (Some(s), Some(e)) if s > e => Err("开始时间不能晚于结束时间".into()),
                    _ => Ok(()),
                }
            }
            WidgetKind::Scale { options } | WidgetKind::Select { options } => {
                let key = value.as_str().ok_or("应为选项 key")?;
                if options_contain(options, key) {
                    Ok(())
                } else {
                    Err(format!("未知选项: {}", key))
                }
            }
            WidgetKind::MultiSelect { options } | WidgetKind::Organigram { options } => {
                for key in as_key_list(value)? {
                    if !options_contain(options, &key) {
                        return Err(format!("未知选项: {}", key));
                    }
                }
                Ok(())
            }
            WidgetKind::GeoLocation => as_key_list(value).map(|_| ()),
            WidgetKind::Matrix1d { rows } => {
                let rows_value = value.as_object().ok_or("应为对象")?;
                for (row_key, cells) in rows_value {
                    let row = rows
                        .iter()
                        .find(|r| &r.key == row_key)
                        .ok_or_else(|| format!("未知行: {}", row_key))?;
                    let cells = cells.as_object().ok_or("单元格应为对象")?;
                    for cell_key in cells.keys() {
                        if !options_contain(&row.cells, cell_key) {
                            return Err(format!("未知单元格: {}/{}", row_key, cell_key));
                        }
                    }
                }
                Ok(())
            }
            WidgetKind::Matrix2d { rows, columns } => {
                let rows_value = value.as_object().ok_or("应为对象")?;
                for (row_key, sub_rows) in rows_value {
                    let row = rows
                        .iter()
                        .find(|r| &r.key == row_key)
                        .ok_or_else(|| format!("未知行: {}", row_key))?;
                    let sub_rows = sub_rows.as_object().ok_or("子行应为对象")?;
                    for (sub_row_key, cols) in sub_rows {
                        if !options_contain(&row.cells, sub_row_key) {
                            return Err(format!("未知子行: {}/{}", row_key, sub_row_key));
                        }
                        let cols = cols.as_object().ok_or("列应为对象")?;
                        for (col_key, sub_cols) in cols {
                            let column = columns
                                .iter()
                                .find(|c| &c.key == col_key)
                                .ok_or_else(|| format!("未知列: {}", col_key))?;
                            for sub_col in as_key_list(sub_cols)? {
                                if !options_contain(&column.subcolumns, &sub_col) {
                                    return Err(format!("未知子列: {}/{}", col_key, sub_col));
                                }
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    let s = value.as_str().ok_or("日期应为文本")?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("无效日期: {}", s))
}

fn parse_time(value: &Value) -> Result<NaiveTime, String> {
    let s = value.as_str().ok_or("时间应为文本")?;
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("无效时间: {}", s))
}

impl WidgetCondition {
    fn is_satisfied(&self, parent_value: &Value) -> bool {
        match &self.operator {
            ConditionOperator::IncludesAny { values } => selected_keys(parent_value)
                .iter()
                .any(|k| values.contains(k)),
            ConditionOperator::IsEmpty => is_empty_value(parent_value),
            ConditionOperator::IsNotEmpty => !is_empty_value(parent_value),
        }
    }
}

impl Framework {
    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    /// 计算条目上当前被隐藏的控件 ID
    pub fn hidden_widgets(&self, entry: &Entry) -> HashSet<String> {
        let mut visibility: HashMap<&str, bool> = HashMap::new();
        self.widgets
            .iter()
            .filter(|w| !self.is_visible(w, entry, &mut visibility, &mut HashSet::new()))
            .map(|w| w.id.clone())
            .collect()
    }

    fn is_visible<'a>(
        &'a self,
        widget: &'a Widget,
        entry: &Entry,
        memo: &mut HashMap<&'a str, bool>,
        visiting: &mut HashSet<&'a str>,
    ) -> bool {
        if let Some(v) = memo.get(widget.id.as_str()) {
            return *v;
        }
        let Some(condition) = &widget.condition else {
            memo.insert(&widget.id, true);
            return true;
        };
        if !visiting.insert(&widget.id) {
            warn!("[Framework] 控件条件存在循环: {}", widget.id);
            return false;
        }

        let parent_visible = match self.widget(&condition.parent_widget) {
            Some(parent) => self.is_visible(parent, entry, memo, visiting),
            None => true,
        };
        let parent_value = entry
            .attribute(&condition.parent_widget)
            .and_then(|a| a.data.get("value"))
            .unwrap_or(&Value::Null);
        let visible = parent_visible && condition.is_satisfied(parent_value);

        visiting.remove(widget.id.as_str());
        memo.insert(&widget.id, visible);
        visible
    }

    /// 构造发送给服务端的条目，去掉隐藏控件的取值
    pub fn entry_input(&self, entry: &Entry) -> EntryInput {
        let hidden = self.hidden_widgets(entry);
        let mut input = EntryInput::from(entry);
        if !hidden.is_empty() {
            let before = input.attributes.len();
            input.attributes.retain(|a| !hidden.contains(&a.widget));
            debug!(
                "[Framework] 条目 {} 去掉隐藏控件取值 {} 个",
                entry.client_id,
                before - input.attributes.len()
            );
        }
        input
    }

    /// 本地校验条目，返回 None 表示没有错误
    pub fn validate_entry(&self, entry: &Entry) -> Option<FormError> {
        let mut error = FormError::default();

        match entry.entry_type {
            EntryType::Image if entry.image.is_none() => error.set_field("image", "图片条目必须关联图片"),
            EntryType::Attachment if entry.lead_attachment.is_none() => {
                error.set_field("leadAttachment", "附件条目必须关联附件")
            }
            _ => {}
        }

        let hidden = self.hidden_widgets(entry);
        for attribute in entry.attributes.iter().filter(|a| !hidden.contains(&a.widget)) {
            let result = match self.widget(&attribute.widget) {
                None => Err(format!("未知控件: {}", attribute.widget)),
                Some(w) if w.kind.widget_type() != attribute.widget_type => Err(format!(
                    "控件类型不匹配: {:?} != {:?}",
                    attribute.widget_type,
                    w.kind.widget_type()
                )),
                Some(w) => w.kind.validate(&attribute.data),
            };
            if let Err(message) = result {
                let mut item = FormError::default();
                item.set_field("data", message);
                error.set_array_item("attributes", &attribute.client_id, item);
            }
        }

        if error.is_empty() {
            None
        } else {
            Some(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagging::entry::models::{AttributeValue, FormErrorNode};
    use serde_json::json;

    fn option(key: &str) -> WidgetOption {
        WidgetOption {
            key: key.to_string(),
            label: key.to_uppercase(),
        }
    }

    fn framework() -> Framework {
        Framework {
            id: "f1".into(),
            title: "Humanitarian".into(),
            widgets: vec![
                Widget {
                    id: "severity".into(),
                    title: "Severity".into(),
                    kind: WidgetKind::Select {
                        options: vec![option("low"), option("high")],
                    },
                    condition: None,
                },
                Widget {
                    id: "details".into(),
                    title: "Details".into(),
                    kind: WidgetKind::Text {
                        max_length: Some(5),
                    },
                    condition: Some(WidgetCondition {
                        parent_widget: "severity".into(),
                        operator: ConditionOperator::IncludesAny {
                            values: vec!["high".into()],
                        },
                    }),
                },
                Widget {
                    id: "followup".into(),
                    title: "Follow up".into(),
                    kind: WidgetKind::Date,
                    condition: Some(WidgetCondition {
                        parent_widget: "details".into(),
                        operator: ConditionOperator::IsNotEmpty,
                    }),
                },
            ],
        }
    }

    fn entry_with(severity: &str) -> Entry {
        let mut entry = Entry::new("lead-1", EntryType::Excerpt);
        entry.attributes = vec![
            AttributeValue::new("severity", WidgetType::Select, json!({"value": severity})),
            AttributeValue::new("details", WidgetType::Text, json!({"value": "abc"})),
            AttributeValue::new("followup", WidgetType::Date, json!({"value": "2024-02-30"})),
        ];
        entry
    }

    #[test]
    fn hidden_parent_hides_children() {
        let fw = framework();
        let hidden = fw.hidden_widgets(&entry_with("low"));
        assert!(hidden.contains("details"));
        assert!(hidden.contains("followup"));
        assert!(fw.hidden_widgets(&entry_with("high")).is_empty());
    }

    #[test]
    fn entry_input_strips_hidden_attributes() {
        let fw = framework();
        let input = fw.entry_input(&entry_with("low"));
        let widgets: Vec<_> = input.attributes.iter().map(|a| a.widget.as_str()).collect();
        assert_eq!(widgets, vec!["severity"]);
    }

    #[test]
    fn validation_only_covers_visible_widgets() {
        let fw = framework();
        assert!(fw.validate_entry(&entry_with("low")).is_none());

        let entry = entry_with("high");
        let error = fw.validate_entry(&entry).expect("invalid date");
        let followup = &entry.attributes[2].client_id;
        match error.fields.get("attributes") {
            Some(FormErrorNode::Array(items)) => {
                assert_eq!(items.len(), 1);
                assert!(items[followup].field_message("data").is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn matrix2d_rejects_unknown_subcolumn() {
        let kind = WidgetKind::Matrix2d {
            rows: vec![MatrixRow {
                key: "context".into(),
                label: "Context".into(),
                cells: vec![option("politics")],
            }],
            columns: vec![MatrixColumn {
                key: "health".into(),
                label: "Health".into(),
                subcolumns: vec![option("covid")],
            }],
        };
        assert!(kind
            .validate(&json!({"value": {"context": {"politics": {"health": ["covid"]}}}}))
            .is_ok());
        assert!(kind
            .validate(&json!({"value": {"context": {"politics": {"health": ["wash"]}}}}))
            .is_err());
    }

    #[test]
    fn ranges_and_numbers() {
        assert!(WidgetKind::DateRange
            .validate(&json!({"value": {"startDate": "2024-05-01", "endDate": "2024-04-01"}}))
            .is_err());
        assert!(WidgetKind::TimeRange
            .validate(&json!({"value": {"startTime": "08:00", "endTime": "09:30"}}))
            .is_ok());
        let number = WidgetKind::Number {
            min_value: Some(0.0),
            max_value: Some(10.0),
        };
        assert!(number.validate(&json!({"value": 11})).is_err());
        assert!(number.validate(&json!({"value": null})).is_ok());
    }

    #[test]
    fn widget_parses_from_framework_json() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w9",
            "title": "Sectors",
            "widgetId": "MULTISELECT",
            "properties": {"options": [{"key": "a", "label": "A"}]}
        }))
        .unwrap();
        assert_eq!(widget.kind.widget_type(), WidgetType::MultiSelect);
        assert!(widget.condition.is_none());
    }
}
