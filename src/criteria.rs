//! Search criteria compiler.
//!
//! GLPI's `search/{itemtype}` endpoint takes its criteria tree as flat query
//! parameters whose keys spell out each node's position:
//!
//! ```text
//! criteria[0][field]=1
//! criteria[0][searchtype]=contains
//! criteria[0][value]=printer
//! criteria[1][link]=OR
//! criteria[1][criteria][0][field]=12
//! ...
//! ```
//!
//! [`compile`] performs that flattening for a typed [`Criterion`] list.
//! [`parse_criteria`] turns loosely-typed JSON (as received from tool calls)
//! into that typed list, rejecting malformed shapes before anything is sent.
//! Neither function judges whether a field id or search type is meaningful;
//! GLPI does that.

use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::models::{Criterion, Link, Scalar, SearchType};

/// Flattened criteria, in emission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledCriteria {
    params: Vec<(String, Scalar)>,
}

impl CompiledCriteria {
    /// Number of emitted parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if no parameters were emitted.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Looks up a parameter by key.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterates over `(key, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the parameters as string pairs for a query string.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Flattens an ordered criteria list into positional query parameters.
///
/// Sibling order is preserved through the indices embedded in each key, and
/// within a criterion keys are emitted as `link`, `field`, `searchtype`,
/// `value`, then any extra keys. Groups recurse to any depth.
pub fn compile(criteria: &[Criterion]) -> CompiledCriteria {
    let mut params = Vec::new();
    for (index, criterion) in criteria.iter().enumerate() {
        emit(&format!("criteria[{}]", index), criterion, &mut params);
    }

    tracing::debug!(
        criteria = criteria.len(),
        params = params.len(),
        "Compiled search criteria"
    );

    CompiledCriteria { params }
}

fn emit(prefix: &str, criterion: &Criterion, out: &mut Vec<(String, Scalar)>) {
    if let Some(link) = criterion.link() {
        out.push((
            format!("{}[link]", prefix),
            Scalar::Text(link.as_str().to_string()),
        ));
    }

    match criterion {
        Criterion::Leaf {
            field,
            searchtype,
            value,
            extra,
            ..
        } => {
            out.push((format!("{}[field]", prefix), field.clone()));
            out.push((
                format!("{}[searchtype]", prefix),
                Scalar::Text(searchtype.as_str().to_string()),
            ));
            out.push((format!("{}[value]", prefix), value.clone()));
            for (key, extra_value) in extra {
                out.push((format!("{}[{}]", prefix, key), extra_value.clone()));
            }
        }
        Criterion::Group { criteria, .. } => {
            for (index, sub) in criteria.iter().enumerate() {
                emit(&format!("{}[criteria][{}]", prefix, index), sub, out);
            }
        }
    }
}

/// Parses loosely-typed JSON into a criteria list.
///
/// Accepts `null` (no criteria) or an array of objects. Each object is either
/// a group (`criteria` array, optional `link`) or a leaf (`field`,
/// `searchtype`, `value`, optional `link`, plus optional scalar extras such as
/// `meta` or `itemtype`).
///
/// # Errors
///
/// Returns `GatewayError::CriteriaShape` naming the offending position.
pub fn parse_criteria(value: &Value) -> Result<Vec<Criterion>, GatewayError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => parse_list(items, "criteria"),
        _ => Err(GatewayError::criteria_shape(
            "criteria",
            "expected an array of criteria",
        )),
    }
}

/// Parses and compiles in one step.
pub fn compile_json(value: &Value) -> Result<CompiledCriteria, GatewayError> {
    Ok(compile(&parse_criteria(value)?))
}

fn parse_list(items: &[Value], prefix: &str) -> Result<Vec<Criterion>, GatewayError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_criterion(item, &format!("{}[{}]", prefix, index)))
        .collect()
}

fn parse_criterion(value: &Value, path: &str) -> Result<Criterion, GatewayError> {
    let Value::Object(object) = value else {
        return Err(GatewayError::criteria_shape(path, "expected an object"));
    };

    let link = parse_link(object, path)?;

    if let Some(nested) = object.get("criteria") {
        let Value::Array(items) = nested else {
            return Err(GatewayError::criteria_shape(
                path,
                "`criteria` must be an array",
            ));
        };
        if let Some(key) = object
            .keys()
            .find(|key| key.as_str() != "criteria" && key.as_str() != "link")
        {
            return Err(GatewayError::criteria_shape(
                path,
                format!("a group cannot also carry `{}`", key),
            ));
        }
        return Ok(Criterion::Group {
            link,
            criteria: parse_list(items, &format!("{}[criteria]", path))?,
        });
    }

    let field = required_scalar(object, "field", path)?;
    let searchtype = match object.get("searchtype") {
        Some(Value::String(raw)) => SearchType::parse(raw),
        Some(_) => {
            return Err(GatewayError::criteria_shape(
                path,
                "`searchtype` must be a string",
            ))
        }
        None => {
            return Err(GatewayError::criteria_shape(
                path,
                "missing `searchtype` (or `criteria` for a group)",
            ))
        }
    };
    let value = required_scalar(object, "value", path)?;

    let mut extra = Vec::new();
    for (key, raw) in object {
        if matches!(key.as_str(), "link" | "field" | "searchtype" | "value") {
            continue;
        }
        let scalar = Scalar::from_json(raw).ok_or_else(|| {
            GatewayError::criteria_shape(path, format!("`{}` must be a scalar", key))
        })?;
        extra.push((key.clone(), scalar));
    }

    Ok(Criterion::Leaf {
        link,
        field,
        searchtype,
        value,
        extra,
    })
}

fn parse_link(object: &Map<String, Value>, path: &str) -> Result<Option<Link>, GatewayError> {
    match object.get("link") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Ok(Some(Link::parse(raw))),
        Some(_) => Err(GatewayError::criteria_shape(path, "`link` must be a string")),
    }
}

fn required_scalar(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Scalar, GatewayError> {
    let raw = object.get(key).ok_or_else(|| {
        GatewayError::criteria_shape(
            path,
            format!("missing `{}` (or `criteria` for a group)", key),
        )
    })?;
    Scalar::from_json(raw)
        .ok_or_else(|| GatewayError::criteria_shape(path, format!("`{}` must be a scalar", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pairs(compiled: &CompiledCriteria) -> Vec<(String, String)> {
        compiled.to_query_pairs()
    }

    #[test]
    fn test_empty_list_compiles_to_nothing() {
        assert!(compile(&[]).is_empty());
        assert!(compile_json(&json!([])).unwrap().is_empty());
        assert!(compile_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_single_leaf() {
        let compiled = compile_json(&json!([
            {"field": 1, "searchtype": "contains", "value": "x"}
        ]))
        .unwrap();

        assert_eq!(compiled.len(), 3);
        assert_eq!(compiled.get("criteria[0][field]"), Some(&Scalar::Integer(1)));
        assert_eq!(
            compiled.get("criteria[0][searchtype]"),
            Some(&Scalar::Text("contains".to_string()))
        );
        assert_eq!(
            compiled.get("criteria[0][value]"),
            Some(&Scalar::Text("x".to_string()))
        );
    }

    #[test]
    fn test_nested_group_indices_do_not_cross() {
        let compiled = compile_json(&json!([
            {
                "criteria": [
                    {"field": 12, "searchtype": "equals", "value": "notold"},
                    {"link": "OR", "field": 5, "searchtype": "equals", "value": 7}
                ]
            },
            {"link": "AND", "field": 1, "searchtype": "contains", "value": "vpn"}
        ]))
        .unwrap();

        assert_eq!(
            pairs(&compiled),
            vec![
                ("criteria[0][criteria][0][field]".to_string(), "12".to_string()),
                ("criteria[0][criteria][0][searchtype]".to_string(), "equals".to_string()),
                ("criteria[0][criteria][0][value]".to_string(), "notold".to_string()),
                ("criteria[0][criteria][1][link]".to_string(), "OR".to_string()),
                ("criteria[0][criteria][1][field]".to_string(), "5".to_string()),
                ("criteria[0][criteria][1][searchtype]".to_string(), "equals".to_string()),
                ("criteria[0][criteria][1][value]".to_string(), "7".to_string()),
                ("criteria[1][link]".to_string(), "AND".to_string()),
                ("criteria[1][field]".to_string(), "1".to_string()),
                ("criteria[1][searchtype]".to_string(), "contains".to_string()),
                ("criteria[1][value]".to_string(), "vpn".to_string()),
            ]
        );
    }

    #[test]
    fn test_deep_nesting() {
        let criteria = vec![Criterion::group(vec![Criterion::group(vec![
            Criterion::leaf(3i64, SearchType::Under, 4i64),
        ])
        .with_link(Link::AndNot)])];

        let compiled = compile(&criteria);
        assert_eq!(
            compiled.get("criteria[0][criteria][0][link]"),
            Some(&Scalar::Text("AND NOT".to_string()))
        );
        assert_eq!(
            compiled.get("criteria[0][criteria][0][criteria][0][searchtype]"),
            Some(&Scalar::Text("under".to_string()))
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let input = json!([
            {"field": 1, "searchtype": "contains", "value": "a", "meta": true, "itemtype": "User"},
            {"link": "OR", "criteria": [{"field": 2, "searchtype": "equals", "value": 3}]}
        ]);
        let first = compile_json(&input).unwrap();
        let second = compile_json(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            compiled_keys(&first),
            compiled_keys(&second)
        );
    }

    fn compiled_keys(compiled: &CompiledCriteria) -> Vec<String> {
        compiled.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_extra_scalar_keys_pass_through() {
        let compiled = compile_json(&json!([
            {"field": 9, "searchtype": "contains", "value": "x", "meta": true, "itemtype": "Computer"}
        ]))
        .unwrap();
        assert_eq!(compiled.get("criteria[0][meta]"), Some(&Scalar::Bool(true)));
        assert_eq!(
            compiled.get("criteria[0][itemtype]"),
            Some(&Scalar::Text("Computer".to_string()))
        );
    }

    #[test]
    fn test_unknown_searchtype_is_forwarded() {
        let compiled = compile_json(&json!([
            {"field": 1, "searchtype": "regex", "value": "^a"}
        ]))
        .unwrap();
        assert_eq!(
            compiled.get("criteria[0][searchtype]"),
            Some(&Scalar::Text("regex".to_string()))
        );
    }

    #[test]
    fn test_shape_errors() {
        let cases = [
            (json!({"field": 1}), "criteria"),
            (json!(["not an object"]), "criteria[0]"),
            (json!([{"searchtype": "contains", "value": "x"}]), "criteria[0]"),
            (json!([{"field": 1, "searchtype": "contains", "value": [1, 2]}]), "criteria[0]"),
            (json!([{"criteria": "nope"}]), "criteria[0]"),
            (
                json!([{"criteria": [{"field": 1, "searchtype": "contains", "value": {}}]}]),
                "criteria[0][criteria][0]",
            ),
            (
                json!([{"criteria": [], "field": 1}]),
                "criteria[0]",
            ),
        ];

        for (input, expected_path) in cases {
            match parse_criteria(&input) {
                Err(GatewayError::CriteriaShape { path, .. }) => {
                    assert_eq!(path, expected_path, "input: {}", input)
                }
                other => panic!("expected shape error for {}, got {:?}", input, other),
            }
        }
    }
}
