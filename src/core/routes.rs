//! Route templates and the dispatch table
//!
//! Templates use `<name>` placeholders: `/api/widgets/<id>`. The table is
//! computed once from the frozen registry; every resource type contributes
//! the routes of its own endpoint dictionary and nothing else.

use crate::core::Properties;
use crate::core::error::{ConfigError, RequestError};
use crate::core::pagination::param_value;
use crate::core::registry::ResourceTypeId;
use crate::core::resource_type::ResourceType;
use axum::http::Method;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde_json::Value;
use std::collections::HashMap;

/// Characters escaped when a value becomes a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Join path fragments into a normalized absolute path
///
/// Empty fragments and duplicate slashes are dropped; the result always
/// starts with `/` and never ends with one (except the root itself).
pub fn join_url_parts(parts: &[&str]) -> String {
    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Placeholder name if `segment` is `<name>`
pub fn placeholder(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
}

/// Substitute every placeholder with the matching property
///
/// Values are percent-encoded, so each one stays a single segment.
/// Returns `None` if a placeholder has no non-null value.
pub fn fill_template(template: &str, properties: &Properties) -> Option<String> {
    let mut segments = Vec::new();
    for segment in template.split('/').filter(|s| !s.is_empty()) {
        match placeholder(segment) {
            Some(name) => match properties.get(name) {
                None | Some(Value::Null) => return None,
                Some(value) => {
                    let raw = param_value(value);
                    segments.push(utf8_percent_encode(&raw, PATH_SEGMENT).to_string());
                }
            },
            None => segments.push(segment.to_string()),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Template with placeholder names erased, used to detect collisions
pub(crate) fn route_shape(template: &str) -> String {
    template
        .split('/')
        .map(|segment| if placeholder(segment).is_some() { "<>" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// One (template, method) entry of the dispatch table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub template: String,
    pub method: Method,
    pub resource: ResourceTypeId,
    pub endpoint: String,
}

impl Route {
    fn placeholder_count(&self) -> usize {
        self.template
            .split('/')
            .filter(|segment| placeholder(segment).is_some())
            .count()
    }

    /// Bind placeholders against a concrete path; bound values are decoded
    fn bind(&self, path: &str) -> Option<Properties> {
        let template: Vec<&str> = self.template.split('/').filter(|s| !s.is_empty()).collect();
        let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if template.len() != actual.len() {
            return None;
        }
        let mut params = Properties::new();
        for (expected, segment) in template.iter().zip(actual) {
            match placeholder(expected) {
                Some(name) => {
                    let decoded = percent_decode_str(segment).decode_utf8_lossy();
                    params.insert(name.to_string(), Value::String(decoded.into_owned()));
                }
                None if *expected == segment => {}
                None => return None,
            }
        }
        Some(params)
    }
}

/// A route selected for a request, with its bound url params
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub url_params: Properties,
}

/// Every route exposed by a registry
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compute the table, failing on two endpoints with the same shape and method
    pub(crate) fn build<'a>(
        types: impl Iterator<Item = (ResourceTypeId, &'a ResourceType)>,
    ) -> Result<Self, ConfigError> {
        let mut routes = Vec::new();
        let mut seen: HashMap<(String, Method), String> = HashMap::new();

        for (id, resource_type) in types {
            for endpoint in resource_type.endpoints.values() {
                let template = resource_type.endpoint_route(endpoint);
                for method in &endpoint.methods {
                    let key = (route_shape(&template), method.clone());
                    if let Some(existing) = seen.get(&key) {
                        return Err(ConfigError::DuplicateEndpoint {
                            url: format!("{} {}", method, template),
                            existing: existing.clone(),
                            new: resource_type.name.clone(),
                        });
                    }
                    seen.insert(key, resource_type.name.clone());
                    tracing::debug!(
                        resource = %resource_type.name,
                        endpoint = %endpoint.name,
                        "route {} {}",
                        method,
                        template
                    );
                    routes.push(Route {
                        template: template.clone(),
                        method: method.clone(),
                        resource: id,
                        endpoint: endpoint.name.clone(),
                    });
                }
            }
        }
        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes contributed by one resource type
    pub fn for_resource(&self, id: ResourceTypeId) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |route| route.resource == id)
    }

    /// Find the route serving `method path`
    ///
    /// Literal segments win over placeholders. A path that matches some
    /// template under another method is reported as `MethodNotAllowed`.
    pub fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RequestError> {
        let mut candidates: Vec<(&Route, Properties)> = self
            .routes
            .iter()
            .filter_map(|route| route.bind(path).map(|params| (route, params)))
            .collect();

        if candidates.is_empty() {
            return Err(RequestError::UnknownRoute {
                path: path.to_string(),
            });
        }
        candidates.sort_by_key(|(route, _)| route.placeholder_count());

        candidates
            .into_iter()
            .find(|(route, _)| &route.method == method)
            .map(|(route, url_params)| RouteMatch { route, url_params })
            .ok_or_else(|| RequestError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_url_parts_normalizes_slashes() {
        assert_eq!(join_url_parts(&["/api/", "widgets", "<id>"]), "/api/widgets/<id>");
        assert_eq!(join_url_parts(&["", "people"]), "/people");
        assert_eq!(join_url_parts(&["api", "//people//", ""]), "/api/people");
        assert_eq!(join_url_parts(&[""]), "/");
    }

    #[test]
    fn test_fill_template() {
        let props = json!({"id": 5, "slug": "a b"});
        let props = props.as_object().unwrap();
        assert_eq!(
            fill_template("/api/widgets/<id>", props),
            Some("/api/widgets/5".to_string())
        );
        assert_eq!(fill_template("/api/widgets/<missing>", props), None);
        assert_eq!(fill_template("/api/widgets", props), Some("/api/widgets".to_string()));
    }

    #[test]
    fn test_fill_template_encodes_each_value_as_one_segment() {
        let props = json!({"slug": "a b", "path": "x/y", "pct": "50%"});
        let props = props.as_object().unwrap();
        assert_eq!(
            fill_template("/tags/<slug>", props),
            Some("/tags/a%20b".to_string())
        );
        assert_eq!(
            fill_template("/tags/<path>", props),
            Some("/tags/x%2Fy".to_string())
        );
        assert_eq!(
            fill_template("/tags/<pct>", props),
            Some("/tags/50%25".to_string())
        );
    }

    fn route(template: &str, method: Method, endpoint: &str) -> Route {
        Route {
            template: template.to_string(),
            method,
            resource: ResourceTypeId::from_index(0),
            endpoint: endpoint.to_string(),
        }
    }

    fn table() -> RouteTable {
        RouteTable {
            routes: vec![
                route("/people", Method::GET, "retrieve_list"),
                route("/people", Method::POST, "create"),
                route("/people/<id>", Method::GET, "retrieve"),
                route("/people/search", Method::GET, "search"),
            ],
        }
    }

    #[test]
    fn test_match_binds_url_params() {
        let table = table();
        let matched = table.match_route(&Method::GET, "/people/42").unwrap();
        assert_eq!(matched.route.endpoint, "retrieve");
        assert_eq!(matched.url_params["id"], json!("42"));
    }

    #[test]
    fn test_bound_params_are_decoded() {
        let table = table();
        let matched = table.match_route(&Method::GET, "/people/a%20b").unwrap();
        assert_eq!(matched.url_params["id"], json!("a b"));

        let matched = table.match_route(&Method::GET, "/people/x%2Fy").unwrap();
        assert_eq!(matched.route.endpoint, "retrieve");
        assert_eq!(matched.url_params["id"], json!("x/y"));
    }

    #[test]
    fn test_literal_segments_win() {
        let table = table();
        let matched = table.match_route(&Method::GET, "/people/search").unwrap();
        assert_eq!(matched.route.endpoint, "search");
    }

    #[test]
    fn test_unknown_path_and_wrong_method() {
        let table = table();
        assert!(matches!(
            table.match_route(&Method::GET, "/cars"),
            Err(RequestError::UnknownRoute { .. })
        ));
        assert!(matches!(
            table.match_route(&Method::DELETE, "/people"),
            Err(RequestError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn test_route_shape_ignores_placeholder_names() {
        assert_eq!(route_shape("/a/<id>"), route_shape("/a/<uuid>"));
        assert_ne!(route_shape("/a/<id>"), route_shape("/b/<id>"));
    }
}
