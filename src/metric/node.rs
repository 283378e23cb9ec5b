//! `RawNode` is the source-agnostic shape every collector reduces its payload
//! to before handing it to the engine. JSON documents and XML element trees
//! both convert into it, as do synthetic trees built from tabular rows.

use roxmltree;
use serde_json;
use std::fmt;

/// A nested, insertion ordered tree of scalars.
///
/// Maps are kept as ordered key / value pairs rather than a hashmap. This keeps
/// the source's declaration order and allows the repeated keys that XML
/// documents are full of.
#[derive(Clone, Debug, PartialEq)]
pub enum RawNode {
    /// An explicit null, or an element with no content.
    Null,
    /// A boolean leaf. Booleans are not numeric.
    Bool(bool),
    /// A numeric leaf.
    Number(f64),
    /// A textual leaf.
    Text(String),
    /// A sequence of nodes.
    List(Vec<RawNode>),
    /// A mapping of keys to nodes, in declaration order.
    Map(Vec<(String, RawNode)>),
}

impl RawNode {
    /// Parse a JSON document into a tree.
    pub fn parse_json(source: &str) -> Result<RawNode, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(source)?;
        Ok(RawNode::from(value))
    }

    /// Parse an XML document into a tree.
    ///
    /// The result is a single-entry map keyed by the root element's tag name.
    /// Each element becomes a map of its attributes followed by its child
    /// elements. Elements without attributes or children become leaves: text
    /// is kept verbatim as `Text`, empty elements are `Null`. Numbers are
    /// parsed where they are read, see `as_f64` and `to_number`.
    pub fn parse_xml(source: &str) -> Result<RawNode, roxmltree::Error> {
        let doc = roxmltree::Document::parse(source)?;
        let root = doc.root_element();
        Ok(RawNode::Map(vec![(
            root.tag_name().name().to_string(),
            from_element(root),
        )]))
    }

    /// The entries of a map node, `None` for every other kind of node.
    pub fn as_map(&self) -> Option<&[(String, RawNode)]> {
        match *self {
            RawNode::Map(ref kvs) => Some(kvs),
            _ => None,
        }
    }

    /// The value of a numeric leaf, or of a text leaf holding a finite
    /// number.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            RawNode::Number(f) => Some(f),
            RawNode::Text(ref s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// This node with numeric text leaves read as `Number`. Every other node
    /// is returned unchanged.
    pub fn to_number(&self) -> RawNode {
        match *self {
            RawNode::Text(_) => match self.as_f64() {
                Some(f) => RawNode::Number(f),
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Look up the first child stored under `key`.
    pub fn get(&self, key: &str) -> Option<&RawNode> {
        self.as_map()
            .and_then(|kvs| kvs.iter().find(|&&(ref k, _)| k == key))
            .map(|&(_, ref v)| v)
    }

    /// Every child stored under `key`, in order.
    pub fn children<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a RawNode> + 'a {
        self.as_map()
            .unwrap_or(&[])
            .iter()
            .filter(move |&&(ref k, _)| k == key)
            .map(|&(_, ref v)| v)
    }

    /// Walk a `/` separated path of keys, taking the first match at each
    /// step.
    pub fn find(&self, path: &str) -> Option<&RawNode> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(self, |node, key| node.get(key))
    }

    /// Render a scalar leaf as text. Integral numbers render without a
    /// fractional part. Maps, lists and nulls have no textual form.
    pub fn text(&self) -> Option<String> {
        match *self {
            RawNode::Text(ref s) => Some(s.clone()),
            RawNode::Bool(b) => Some(if b { "True".into() } else { "False".into() }),
            RawNode::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(format!("{}", f))
                }
            }
            _ => None,
        }
    }
}

fn from_element(node: roxmltree::Node) -> RawNode {
    let mut kvs = Vec::new();
    for attr in node.attributes() {
        kvs.push((attr.name().to_string(), leaf(attr.value())));
    }
    for child in node.children().filter(|n| n.is_element()) {
        kvs.push((child.tag_name().name().to_string(), from_element(child)));
    }
    if kvs.is_empty() {
        leaf(node.text().unwrap_or(""))
    } else {
        RawNode::Map(kvs)
    }
}

fn leaf(text: &str) -> RawNode {
    let text = text.trim();
    if text.is_empty() {
        RawNode::Null
    } else {
        RawNode::Text(text.to_string())
    }
}

impl From<serde_json::Value> for RawNode {
    fn from(value: serde_json::Value) -> RawNode {
        use serde_json::Value;
        match value {
            Value::Null => RawNode::Null,
            Value::Bool(b) => RawNode::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawNode::Number(f),
                None => RawNode::Text(n.to_string()),
            },
            Value::String(s) => RawNode::Text(s),
            Value::Array(xs) => RawNode::List(xs.into_iter().map(RawNode::from).collect()),
            Value::Object(obj) => {
                RawNode::Map(obj.into_iter().map(|(k, v)| (k, RawNode::from(v))).collect())
            }
        }
    }
}

impl From<f64> for RawNode {
    fn from(f: f64) -> RawNode {
        RawNode::Number(f)
    }
}

impl From<i64> for RawNode {
    fn from(i: i64) -> RawNode {
        RawNode::Number(i as f64)
    }
}

impl From<i32> for RawNode {
    fn from(i: i32) -> RawNode {
        RawNode::Number(f64::from(i))
    }
}

impl From<u64> for RawNode {
    fn from(u: u64) -> RawNode {
        RawNode::Number(u as f64)
    }
}

impl From<usize> for RawNode {
    fn from(u: usize) -> RawNode {
        RawNode::Number(u as f64)
    }
}

impl<'a> From<&'a str> for RawNode {
    fn from(s: &'a str) -> RawNode {
        RawNode::Text(s.to_string())
    }
}

impl From<String> for RawNode {
    fn from(s: String) -> RawNode {
        RawNode::Text(s)
    }
}

impl<T> From<Option<T>> for RawNode
where
    T: Into<RawNode>,
{
    fn from(opt: Option<T>) -> RawNode {
        match opt {
            Some(t) => t.into(),
            None => RawNode::Null,
        }
    }
}

impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RawNode::Null => write!(f, "null"),
            RawNode::Map(_) => write!(f, "<map>"),
            RawNode::List(ref xs) => write!(f, "<list of {}>", xs.len()),
            RawNode::Text(ref s) => write!(f, "{:?}", s),
            _ => write!(f, "{}", self.text().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn json_keeps_declaration_order() {
        let node = RawNode::parse_json(r#"{"zz": 1, "aa": {"m": "x"}, "mm": null}"#).unwrap();
        let keys: Vec<&str> = node.as_map()
            .unwrap()
            .iter()
            .map(|&(ref k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["zz", "aa", "mm"]);
        assert_eq!(node.get("zz"), Some(&RawNode::Number(1.0)));
        assert_eq!(node.find("aa/m"), Some(&RawNode::Text("x".into())));
        assert_eq!(node.get("mm"), Some(&RawNode::Null));
    }

    #[test]
    fn xml_elements_become_maps_and_leaves() {
        let xml = r#"<monit version="5.2">
  <services>
    <service name="web"><status>0</status><type>3</type></service>
    <service name="db"><status>512</status><type>3</type><empty/></service>
  </services>
</monit>"#;
        let node = RawNode::parse_xml(xml).unwrap();
        let monit = node.get("monit").unwrap();
        assert_eq!(monit.get("version"), Some(&RawNode::Text("5.2".into())));
        assert_eq!(monit.get("version").and_then(RawNode::as_f64), Some(5.2));

        let services: Vec<&RawNode> = monit.get("services").unwrap().children("service").collect();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].get("name"), Some(&RawNode::Text("web".into())));
        assert_eq!(services[1].find("status"), Some(&RawNode::Text("512".into())));
        assert_eq!(services[1].find("status").map(RawNode::to_number), Some(RawNode::Number(512.0)));
        assert_eq!(services[1].get("empty"), Some(&RawNode::Null));
    }

    #[test]
    fn xml_text_is_kept_verbatim() {
        let xml = r#"<services><service name="007"><id>123456789012345678</id><ratio>1e3</ratio></service></services>"#;
        let node = RawNode::parse_xml(xml).unwrap();
        let service = node.find("services/service").unwrap();
        assert_eq!(service.get("name").and_then(RawNode::text), Some("007".to_string()));
        assert_eq!(
            service.get("id").and_then(RawNode::text),
            Some("123456789012345678".to_string())
        );
        assert_eq!(service.get("ratio").and_then(RawNode::text), Some("1e3".to_string()));
        assert_eq!(service.get("ratio").and_then(RawNode::as_f64), Some(1000.0));
    }

    #[test]
    fn numeric_text_reads_as_number() {
        assert_eq!(RawNode::from("0.5").to_number(), RawNode::Number(0.5));
        assert_eq!(RawNode::from(" 12 ").to_number(), RawNode::Number(12.0));
        assert_eq!(RawNode::from("web").to_number(), RawNode::from("web"));
        assert_eq!(RawNode::from("NaN").to_number(), RawNode::from("NaN"));
        assert_eq!(RawNode::Null.to_number(), RawNode::Null);
        assert_eq!(RawNode::Bool(true).as_f64(), None);
    }

    #[test]
    fn scalar_text_rendering() {
        assert_eq!(RawNode::Number(80.0).text(), Some("80".to_string()));
        assert_eq!(RawNode::Number(0.25).text(), Some("0.25".to_string()));
        assert_eq!(RawNode::Bool(false).text(), Some("False".to_string()));
        assert_eq!(RawNode::Null.text(), None);
    }
}
