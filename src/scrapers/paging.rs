use serde::{Deserialize, Serialize};
use url::Url;

/// How a site encodes the page number in its listing URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingConvention {
    #[serde(default = "default_param")]
    pub param: String,
    /// Whether page 1 carries the parameter too.
    #[serde(default)]
    pub include_on_first: bool,
}

fn default_param() -> String {
    "page".to_string()
}

impl Default for PagingConvention {
    fn default() -> Self {
        Self {
            param: default_param(),
            include_on_first: false,
        }
    }
}

impl PagingConvention {
    /// URL for `page` (1-based). An existing page parameter in `base_url` is replaced.
    pub fn page_url(&self, base_url: &str, page: u32) -> Result<String, url::ParseError> {
        let mut url = Url::parse(base_url)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != self.param.as_str())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        if !kept.is_empty() || page > 1 || self.include_on_first {
            let mut query = url.query_pairs_mut();
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
            if page > 1 || self.include_on_first {
                query.append_pair(&self.param, &page.to_string());
            }
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_omits_parameter_by_default() {
        let paging = PagingConvention::default();
        let base = "https://www.expat-dakar.com/appartements-a-louer";
        assert_eq!(paging.page_url(base, 1).unwrap(), base);
        assert_eq!(paging.page_url(base, 3).unwrap(), format!("{}?page=3", base));
    }

    #[test]
    fn first_page_can_carry_parameter() {
        let paging = PagingConvention {
            param: "p".to_string(),
            include_on_first: true,
        };
        assert_eq!(
            paging.page_url("https://ads.example.sn/list", 1).unwrap(),
            "https://ads.example.sn/list?p=1"
        );
    }

    #[test]
    fn keeps_other_query_parameters_and_replaces_page() {
        let paging = PagingConvention::default();
        assert_eq!(
            paging
                .page_url("https://ads.example.sn/list?sort=recent&page=9", 2)
                .unwrap(),
            "https://ads.example.sn/list?sort=recent&page=2"
        );
        assert_eq!(
            paging
                .page_url("https://ads.example.sn/list?sort=recent&page=9", 1)
                .unwrap(),
            "https://ads.example.sn/list?sort=recent"
        );
    }

    #[test]
    fn rejects_relative_base() {
        assert!(PagingConvention::default().page_url("/list", 1).is_err());
    }
}
