//! Human readable labels for change paths
use crate::path::{Path, Segment};
use serde_json::Value;

const SEPARATOR: &str = " > ";

/// Property names the change log knows how to describe. Anything else is left
/// out of the label.
fn property_label(key: &str) -> Option<&'static str> {
    let label = match key {
        "selectedClient" => "Client",
        "paymentTerms" => "Payment terms",
        "quoteHeadDetails" => "Quote header",
        "addedProducts" => "Products",
        "components" => "Components",
        "company" => "Company",
        "object" | "title" => "Title",
        "description" => "Description",
        "name" => "Name",
        "price" => "Price",
        "discount" => "Discount",
        "discountedPrice" => "Discounted price",
        "quantity" => "Quantity",
        "included" => "Included",
        "category" => "Category",
        "imgUrl" => "Image",
        "note" => "Note",
        "expiresAt" => "Expiry date",
        "dateOfSignature" => "Signature date",
        _ => return None,
    };
    Some(label)
}

fn is_named_collection(key: &str) -> bool {
    matches!(key, "addedProducts" | "components")
}

/// Resolves change paths against the pair of documents being compared, so
/// product and component indices can be shown by name.
pub struct LabelResolver<'a> {
    original: &'a Value,
    working: &'a Value,
}

impl<'a> LabelResolver<'a> {
    pub fn new(original: &'a Value, working: &'a Value) -> Self {
        Self { original, working }
    }

    pub fn resolve(&self, path: &Path) -> String {
        let mut parts: Vec<String> = vec![];
        let mut walked = Path::root();
        let mut parent: Option<&str> = None;

        for segment in path.segments() {
            walked = walked.child(segment.clone());
            match segment {
                Segment::Key(key) => {
                    if let Some(label) = property_label(key) {
                        parts.push(label.to_owned());
                    }
                    parent = Some(key.as_str());
                }
                Segment::Index(index) => {
                    if parent.is_some_and(is_named_collection) {
                        parts.push(
                            self.name_at(&walked)
                                .unwrap_or_else(|| format!("#{}", index + 1)),
                        );
                    }
                    parent = None;
                }
            }
        }

        parts.join(SEPARATOR)
    }

    fn name_at(&self, path: &Path) -> Option<String> {
        let named = |root: &Value| {
            path.lookup(root)
                .and_then(|item| item.get("name"))
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(str::to_owned)
        };
        named(self.working).or_else(|| named(self.original))
    }
}
