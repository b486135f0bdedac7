//! Built-in handlers for definition files.
//!
//! State data is a JSON object; each handler records into its own key and
//! leaves non-object data untouched.

use serde_json::{Map, Value};
use tagflow_core::{HandlerContext, HandlerRegistry};
use tagflow_stream::TagArg;

/// Registry holding every built-in handler.
pub fn builtin() -> HandlerRegistry<Value, TagArg> {
    HandlerRegistry::<Value, TagArg>::new()
        .with("count", count)
        .with("collect_text", collect_text)
        .with("capture_attrs", capture_attrs)
        .with("stay", stay)
}

/// Increments `counts.<action>`.
fn count(ctx: &mut HandlerContext<'_, Value>, _args: &[TagArg]) -> String {
    let action = ctx.action().to_string();
    if let Some(obj) = object(ctx) {
        let counts = obj
            .entry("counts")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(counts) = counts.as_object_mut() {
            let n = counts.get(&action).and_then(Value::as_u64).unwrap_or(0);
            counts.insert(action, Value::from(n + 1));
        }
    }
    ctx.target().to_string()
}

/// Appends text arguments to `text`.
fn collect_text(ctx: &mut HandlerContext<'_, Value>, args: &[TagArg]) -> String {
    let incoming: String = args.iter().filter_map(TagArg::as_text).collect();
    if let Some(obj) = object(ctx) {
        let text = obj
            .entry("text")
            .or_insert_with(|| Value::String(String::new()));
        if let Value::String(text) = text {
            text.push_str(&incoming);
        }
    }
    ctx.target().to_string()
}

/// Appends `{name, attributes}` of tag arguments to `tags`.
fn capture_attrs(ctx: &mut HandlerContext<'_, Value>, args: &[TagArg]) -> String {
    let captured: Vec<Value> = args
        .iter()
        .filter_map(TagArg::as_tag)
        .map(|tag| {
            serde_json::json!({
                "name": tag.name,
                "attributes": tag.attributes,
            })
        })
        .collect();
    if let Some(obj) = object(ctx) {
        let tags = obj
            .entry("tags")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(tags) = tags {
            tags.extend(captured);
        }
    }
    ctx.target().to_string()
}

/// Remains in the current state regardless of the nominal target.
fn stay(ctx: &mut HandlerContext<'_, Value>, _args: &[TagArg]) -> String {
    ctx.state().to_string()
}

fn object<'c>(ctx: &'c mut HandlerContext<'_, Value>) -> Option<&'c mut Map<String, Value>> {
    let action = ctx.action().to_string();
    let obj = ctx.data_mut().as_object_mut();
    if obj.is_none() {
        tracing::warn!("state data is not an object; '{}' not recorded", action);
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tagflow_core::{Machine, TableDefinition};
    use tagflow_sax::OpenTag;

    fn machine(definition: Value, data: Value) -> Machine<Value, TagArg> {
        let def = TableDefinition::from_json(&definition).unwrap();
        let table = def.compile(&builtin()).unwrap();
        Machine::new(Arc::new(table), "A", data)
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(
            builtin().names(),
            vec!["capture_attrs", "collect_text", "count", "stay"]
        );
    }

    #[test]
    fn test_count() {
        let mut m = machine(
            json!({"states": {"A": {"o:x": ["A", "count"], "t": ["B", "count"]}}}),
            json!({}),
        );
        m.dispatch("o:x", &[]).unwrap();
        m.dispatch("o:x", &[]).unwrap();
        m.dispatch("t", &[]).unwrap();

        assert_eq!(m.state(), "B");
        assert_eq!(m.data(), &json!({"counts": {"o:x": 2, "t": 1}}));
    }

    #[test]
    fn test_collect_text() {
        let mut m = machine(
            json!({"states": {"A": {"t": ["A", "collect_text"]}}}),
            json!({"text": "> "}),
        );
        m.dispatch("t", &[TagArg::Text("one".into())]).unwrap();
        m.dispatch("t", &[TagArg::Text(" two".into())]).unwrap();

        assert_eq!(m.data()["text"], "> one two");
    }

    #[test]
    fn test_capture_attrs() {
        let mut m = machine(
            json!({"states": {"A": {"o:item": {"to": "A", "handler": "capture_attrs"}}}}),
            json!({}),
        );
        let tag = OpenTag::new("item").with_attribute("id", "7");
        m.dispatch("o:item", &[TagArg::Tag(tag)]).unwrap();

        assert_eq!(
            m.data()["tags"],
            json!([{"name": "item", "attributes": {"id": "7"}}])
        );
    }

    #[test]
    fn test_stay_ignores_target() {
        let mut m = machine(
            json!({"states": {"A": {"o:x": ["ELSEWHERE", "stay"]}}}),
            json!({}),
        );
        let record = m.dispatch("o:x", &[]).unwrap();
        assert_eq!(record.to, "A");
        assert_eq!(m.state(), "A");
    }

    #[test]
    fn test_non_object_data_is_untouched() {
        let mut m = machine(
            json!({"states": {"A": {"t": ["B", "collect_text"]}}}),
            json!(42),
        );
        m.dispatch("t", &[TagArg::Text("ignored".into())]).unwrap();

        assert_eq!(m.state(), "B");
        assert_eq!(m.data(), &json!(42));
    }
}
