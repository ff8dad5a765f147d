//! JSON shapes spoken by the catalog backend.
//!
//! Outgoing payloads use the backend's field names (`nombre`, `precio`, ...).
//! Incoming documents are read leniently: English field names and `_id` are
//! accepted, identifiers may be strings or numbers, entities may arrive bare
//! or wrapped, and numeric fields are coerced rather than rejected.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{RemoteError, RemoteProduct};
use crate::models::{ProductDraft, ProductId};
use crate::util::normalize_text_option;

const ENTITY_WRAPPERS: [&str; 2] = ["product", "data"];
const LIST_WRAPPERS: [&str; 3] = ["products", "data", "productos"];

#[derive(Debug, Serialize)]
struct WirePayload<'a> {
    nombre: &'a str,
    descripcion: &'a str,
    precio: f64,
    stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    imagen: Option<&'a str>,
    activo: bool,
}

/// Request body for create and update calls
pub fn encode_payload(draft: &ProductDraft) -> Value {
    let payload = WirePayload {
        nombre: &draft.name,
        descripcion: &draft.description,
        precio: draft.price,
        stock: draft.stock,
        imagen: draft.image.as_deref(),
        activo: draft.enabled,
    };
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

/// Decode a single entity response (bare or wrapped in `product`/`data`)
pub fn decode_entity(body: &Value) -> Result<RemoteProduct, RemoteError> {
    let object = body
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object"))?;

    if !has_id(object) {
        for wrapper in ENTITY_WRAPPERS {
            if let Some(Value::Object(inner)) = object.get(wrapper) {
                return decode_object(inner);
            }
        }
    }
    decode_object(object)
}

/// Decode a list response (bare array or wrapped in `products`/`data`).
///
/// Items without a usable identifier are skipped.
pub fn decode_list(body: &Value) -> Result<Vec<RemoteProduct>, RemoteError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(object) => LIST_WRAPPERS
            .iter()
            .find_map(|wrapper| object.get(*wrapper).and_then(Value::as_array))
            .ok_or_else(|| malformed("expected a product array"))?,
        _ => return Err(malformed("expected a product array")),
    };

    let mut products = Vec::with_capacity(items.len());
    for item in items {
        match item.as_object().map(decode_object) {
            Some(Ok(product)) => products.push(product),
            Some(Err(error)) => tracing::warn!("Skipping remote product: {error}"),
            None => tracing::warn!("Skipping non-object entry in product list"),
        }
    }
    Ok(products)
}

fn decode_object(object: &Map<String, Value>) -> Result<RemoteProduct, RemoteError> {
    let id = field(object, &["_id", "id"])
        .and_then(identifier)
        .ok_or_else(|| malformed("product has no identifier"))?;
    if id.is_temporary() {
        return Err(malformed(format!(
            "server assigned identifier '{id}' with the reserved temporary prefix"
        )));
    }

    let fields = ProductDraft {
        name: text(field(object, &["nombre", "name"])),
        description: text(field(object, &["descripcion", "description"])),
        price: coerce_number(field(object, &["precio", "price"])),
        stock: coerce_count(field(object, &["stock"])),
        image: normalize_text_option(Some(text(field(object, &["imagen", "image"])))),
        enabled: field(object, &["activo", "enabled"])
            .and_then(Value::as_bool)
            .unwrap_or(true),
    };
    Ok(RemoteProduct::new(id, fields))
}

fn has_id(object: &Map<String, Value>) -> bool {
    field(object, &["_id", "id"]).and_then(identifier).is_some()
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

fn identifier(value: &Value) -> Option<ProductId> {
    match value {
        Value::String(raw) if !raw.trim().is_empty() => Some(ProductId::new(raw.trim())),
        Value::Number(number) => Some(ProductId::new(number.to_string())),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(raw)) => raw.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

/// Numbers pass through, numeric strings are parsed, anything else is zero.
/// Negative and non-finite values clamp to zero.
fn coerce_number(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() && number > 0.0 {
        number
    } else {
        0.0
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_count(value: Option<&Value>) -> i64 {
    if let Some(Value::Number(number)) = value {
        if let Some(count) = number.as_i64() {
            return count.max(0);
        }
    }
    coerce_number(value).trunc() as i64
}

fn malformed(message: impl Into<String>) -> RemoteError {
    RemoteError::permanent(None, format!("Malformed response: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn encode_payload_uses_backend_field_names() {
        let draft = ProductDraft::new("Widget")
            .with_description("Blue")
            .with_price(9.99)
            .with_stock(3);
        assert_eq!(
            encode_payload(&draft),
            json!({
                "nombre": "Widget",
                "descripcion": "Blue",
                "precio": 9.99,
                "stock": 3,
                "activo": true
            })
        );
    }

    #[test]
    fn decode_entity_accepts_bare_and_wrapped_documents() {
        let bare = json!({"_id": "abc123", "nombre": "Widget", "precio": 9.99});
        let wrapped = json!({"product": {"_id": "abc123", "nombre": "Widget", "precio": 9.99}});
        let data = json!({"message": "ok", "data": {"id": "abc123", "name": "Widget", "price": 9.99}});

        let expected = RemoteProduct::new(
            ProductId::new("abc123"),
            ProductDraft::new("Widget").with_price(9.99),
        );
        assert_eq!(decode_entity(&bare).unwrap(), expected);
        assert_eq!(decode_entity(&wrapped).unwrap(), expected);
        assert_eq!(decode_entity(&data).unwrap(), expected);
    }

    #[test]
    fn decode_entity_coerces_fields() {
        let product = decode_entity(&json!({
            "id": 42,
            "nombre": "Widget",
            "precio": "12.50",
            "stock": "many",
            "imagen": "",
            "activo": null
        }))
        .unwrap();
        assert_eq!(product.id.as_str(), "42");
        assert!((product.fields.price - 12.5).abs() < f64::EPSILON);
        assert_eq!(product.fields.stock, 0);
        assert_eq!(product.fields.image, None);
        assert!(product.fields.enabled);
    }

    #[test]
    fn negative_numbers_clamp_to_zero() {
        let product =
            decode_entity(&json!({"_id": "a", "precio": -3.0, "stock": -7})).unwrap();
        assert!(product.fields.price.abs() < f64::EPSILON);
        assert_eq!(product.fields.stock, 0);
    }

    #[test]
    fn decode_entity_requires_identifier() {
        let error = decode_entity(&json!({"nombre": "Widget"})).unwrap_err();
        assert!(!error.is_retryable());
        assert!(decode_entity(&json!({"_id": "tmp-123"})).is_err());
    }

    #[test]
    fn decode_list_accepts_wrappers_and_skips_bad_items() {
        let bare = json!([{"_id": "a"}, {"_id": "b"}]);
        assert_eq!(decode_list(&bare).unwrap().len(), 2);

        let wrapped = json!({"products": [{"_id": "a"}, {"nombre": "no id"}, 7]});
        let products = decode_list(&wrapped).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "a");

        assert!(decode_list(&json!({"message": "nope"})).is_err());
    }
}
