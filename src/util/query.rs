use url::Url;

/// Appends `key=value` pairs to the query of `base`, keeping any existing pairs and
/// fragment in place.
pub fn append_query(base: &str, pairs: &[(&str, &str)]) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// Decoded key/value pairs of the query of `url`, in order. Unparseable URLs have none.
pub fn parse_query_string(url: &str) -> Vec<(String, String)> {
    match Url::parse(url) {
        Ok(url) => url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect(),
        Err(err) => {
            log::debug!("cannot read query of {url}: {err}");
            Vec::new()
        }
    }
}
