//! Recursive metadata tree attached to a product

use serde::{Deserialize, Serialize};

pub const TYPE_ASCII: &str = "ascii";
pub const TYPE_UTC: &str = "utc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub name: String,
    /// Value type as written in the MDATTR `type` attribute (`ascii`, `utc`,
    /// `int32`, `float64`, ...)
    pub type_name: String,
    /// Element values as text; arrays are comma-separated
    pub value: String,
    pub num_elems: usize,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub read_only: bool,
}

impl MetadataAttribute {
    pub fn ascii(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: TYPE_ASCII.to_string(),
            value: value.to_string(),
            num_elems: 1,
            unit: None,
            description: None,
            read_only: false,
        }
    }

    /// Numeric attribute with one or more elements of the given type
    pub fn numeric(name: &str, type_name: &str, values: &[f64]) -> Self {
        let value = values
            .iter()
            .map(|v| format_number(*v, type_name))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            value,
            num_elems: values.len().max(1),
            unit: None,
            description: None,
            read_only: false,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn is_ascii(&self) -> bool {
        self.type_name == TYPE_ASCII || self.type_name == TYPE_UTC
    }

    /// Numeric elements; empty for text attributes or unparsable values
    pub fn as_f64_values(&self) -> Vec<f64> {
        if self.is_ascii() {
            return Vec::new();
        }
        self.value
            .split(',')
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .collect()
    }
}

fn format_number(v: f64, type_name: &str) -> String {
    if type_name.starts_with("float") {
        format!("{:?}", v)
    } else {
        format!("{}", v as i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataElement {
    pub name: String,
    pub description: Option<String>,
    pub elements: Vec<MetadataElement>,
    pub attributes: Vec<MetadataAttribute>,
}

impl MetadataElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_element(&mut self, element: MetadataElement) {
        self.elements.push(element);
    }

    pub fn add_attribute(&mut self, attribute: MetadataAttribute) {
        self.attributes.push(attribute);
    }

    pub fn element(&self, name: &str) -> Option<&MetadataElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&MetadataAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.attributes.is_empty()
    }

    /// Total number of elements in this subtree including `self`
    pub fn count_elements(&self) -> usize {
        1 + self.elements.iter().map(|e| e.count_elements()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_copy_is_independent() {
        let mut root = MetadataElement::new("metadata");
        let mut history = MetadataElement::new("history");
        history.add_attribute(MetadataAttribute::ascii("processor", "v1"));
        root.add_element(history);

        let mut copy = root.clone();
        copy.elements[0].attributes[0].value = "v2".to_string();

        assert_eq!(root.element("history").unwrap().attribute("processor").unwrap().value, "v1");
        assert_eq!(copy.count_elements(), 2);
    }

    #[test]
    fn test_numeric_attribute() {
        let attr = MetadataAttribute::numeric("coeffs", "float64", &[1.5, -2.0]).with_unit("m");
        assert_eq!(attr.value, "1.5,-2.0");
        assert_eq!(attr.num_elems, 2);
        assert_eq!(attr.as_f64_values(), vec![1.5, -2.0]);

        let ints = MetadataAttribute::numeric("n", "int32", &[7.0]);
        assert_eq!(ints.value, "7");
        assert!(MetadataAttribute::ascii("a", "1").as_f64_values().is_empty());
    }
}
