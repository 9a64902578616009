//! Asset catalog ("app manifest") documents.

use serde::Deserialize;

use super::{ManifestError, ManifestResult};

#[derive(Debug, Deserialize)]
struct ElementList {
    elements: Vec<CatalogElement>,
}

/// One catalog entry describing the live build of an app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogElement {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub label_name: String,
    #[serde(default)]
    pub build_version: String,
    #[serde(default)]
    pub hash: String,
    pub manifests: Vec<ManifestDescriptor>,
}

impl CatalogElement {
    /// The first manifest descriptor. Decoding guarantees there is one.
    pub fn primary_manifest(&self) -> &ManifestDescriptor {
        &self.manifests[0]
    }
}

/// Where a manifest can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    pub uri: String,
    #[serde(default)]
    pub query_params: Option<Vec<QueryParam>>,
}

impl ManifestDescriptor {
    /// `uri` with its query parameters appended verbatim (no encoding).
    pub fn built_url(&self) -> String {
        match &self.query_params {
            None => self.uri.clone(),
            Some(params) => {
                let query = params
                    .iter()
                    .map(|p| format!("{}={}", p.name, p.value))
                    .collect::<Vec<_>>()
                    .join("&");
                format!("{}?{}", self.uri, query)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

/// Parse a catalog response and select its first element.
pub(crate) fn parse_catalog(raw: &[u8]) -> ManifestResult<CatalogElement> {
    let list: ElementList =
        serde_json::from_slice(raw).map_err(|e| ManifestError::CatalogParse(e.to_string()))?;

    let element = list
        .elements
        .into_iter()
        .next()
        .ok_or_else(|| ManifestError::CatalogParse("catalog has no elements".to_string()))?;

    if element.manifests.is_empty() {
        return Err(ManifestError::CatalogParse(format!(
            "catalog element {} lists no manifests",
            element.app_name
        )));
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_url_without_params() {
        let descriptor = ManifestDescriptor {
            uri: "http://cdn.test/a.manifest".to_string(),
            query_params: None,
        };
        assert_eq!(descriptor.built_url(), "http://cdn.test/a.manifest");
    }

    #[test]
    fn test_built_url_with_params() {
        let descriptor = ManifestDescriptor {
            uri: "http://cdn.test/a.manifest".to_string(),
            query_params: Some(vec![
                QueryParam {
                    name: "a".to_string(),
                    value: "1".to_string(),
                },
                QueryParam {
                    name: "b".to_string(),
                    value: "x y".to_string(),
                },
            ]),
        };
        assert_eq!(descriptor.built_url(), "http://cdn.test/a.manifest?a=1&b=x y");
    }

    #[test]
    fn test_parse_catalog_selects_first_element() {
        let raw = br#"{
            "elements": [
                {
                    "appName": "Game",
                    "labelName": "Live",
                    "buildVersion": "10.00",
                    "hash": "abc",
                    "manifests": [
                        { "uri": "http://cdn.test/one.manifest", "queryParams": [{ "name": "t", "value": "k" }] },
                        { "uri": "http://mirror.test/one.manifest" }
                    ]
                },
                { "appName": "Other", "manifests": [{ "uri": "http://cdn.test/two.manifest" }] }
            ]
        }"#;
        let element = parse_catalog(raw).unwrap();
        assert_eq!(element.app_name, "Game");
        assert_eq!(element.build_version, "10.00");
        assert_eq!(
            element.primary_manifest().built_url(),
            "http://cdn.test/one.manifest?t=k"
        );
    }

    #[test]
    fn test_parse_catalog_rejects_empty() {
        assert!(matches!(
            parse_catalog(br#"{ "elements": [] }"#),
            Err(ManifestError::CatalogParse(_))
        ));
        assert!(matches!(
            parse_catalog(br#"{ "elements": [{ "appName": "Game", "manifests": [] }] }"#),
            Err(ManifestError::CatalogParse(_))
        ));
        assert!(matches!(
            parse_catalog(b"<html>"),
            Err(ManifestError::CatalogParse(_))
        ));
    }
}
