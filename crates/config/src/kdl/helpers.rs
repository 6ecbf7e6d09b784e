//! Accessors for `name value` child entries inside a KDL block.

use anyhow::{anyhow, Result};
use kdl::{KdlNode, KdlValue};

/// First positional argument of the child node `name`, if present
fn child_arg<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlValue> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)?
        .entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
}

pub fn get_string_entry(node: &KdlNode, name: &str) -> Result<Option<String>> {
    match child_arg(node, name) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| type_error(node, name, "a string", value)),
    }
}

pub fn get_bool_entry(node: &KdlNode, name: &str) -> Result<Option<bool>> {
    match child_arg(node, name) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| type_error(node, name, "#true or #false", value)),
    }
}

/// Non-negative integer entry, range-checked into `u64`
pub fn get_u64_entry(node: &KdlNode, name: &str) -> Result<Option<u64>> {
    match child_arg(node, name) {
        None => Ok(None),
        Some(value) => {
            let int = value
                .as_integer()
                .ok_or_else(|| type_error(node, name, "an integer", value))?;
            u64::try_from(int).map(Some).map_err(|_| {
                anyhow!(
                    "'{}' in '{}' must be a non-negative integer, got {}",
                    name,
                    node.name().value(),
                    int
                )
            })
        }
    }
}

pub fn get_u32_entry(node: &KdlNode, name: &str) -> Result<Option<u32>> {
    get_u64_entry(node, name)?
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                anyhow!("'{}' in '{}' is out of range: {}", name, node.name().value(), v)
            })
        })
        .transpose()
}

/// Named child block, e.g. `circuit-breaker { ... }`
pub fn get_child_node<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

/// Names of child entries not in `known`, for unknown-key warnings
pub fn unknown_entries<'a>(node: &'a KdlNode, known: &[&str]) -> Vec<&'a str> {
    node.children()
        .map(|doc| {
            doc.nodes()
                .iter()
                .map(|child| child.name().value())
                .filter(|name| !known.contains(name))
                .collect()
        })
        .unwrap_or_default()
}

fn type_error(node: &KdlNode, name: &str, expected: &str, got: &KdlValue) -> anyhow::Error {
    anyhow!(
        "'{}' in '{}' must be {}, got {}",
        name,
        node.name().value(),
        expected,
        got
    )
}
