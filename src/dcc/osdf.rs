//! Blocking HTTP client for the OSDF REST API.
use anyhow::{Context, Result};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{Document, DocumentStore};
use crate::errors::Error;

#[derive(Deserialize, Debug)]
struct OqlPage {
    #[serde(default)]
    results: Vec<Document>,
    #[serde(default)]
    search_result_total: Option<usize>,
}

pub struct OsdfClient {
    client: Client,
    server: String,
    username: String,
    password: String,
    namespace: String,
}

impl OsdfClient {
    pub fn new(server: &str, username: &str, password: &str, namespace: &str) -> Result<Self> {
        Ok(OsdfClient {
            client: Client::builder().build()?,
            server: server.trim_end_matches('/').to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
            namespace: namespace.to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Dcc {
                url: url.to_owned(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            }
            .into());
        }
        Ok(response)
    }
}

impl DocumentStore for OsdfClient {
    fn load(&self, id: &str) -> Result<Document> {
        let url = self.url(&format!("/nodes/{}", id));
        let response = self.send(self.client.get(&url), &url)?;
        Ok(response.json()?)
    }

    fn oql_query(&self, query: &str) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for page in 1.. {
            let url = self.url(&format!("/nodes/oql/{}/page/{}", self.namespace, page));
            debug!("OQL {} page {}", query, page);
            let response = self.send(self.client.post(&url).body(query.to_owned()), &url)?;
            let result: OqlPage = response.json()?;
            let n = result.results.len();
            documents.extend(result.results);
            let done = match result.search_result_total {
                Some(total) => documents.len() >= total,
                None => true,
            };
            if n == 0 || done {
                break;
            }
        }
        Ok(documents)
    }

    fn save(&self, doc: &Document) -> Result<String> {
        match &doc.id {
            Some(id) => {
                let url = self.url(&format!("/nodes/{}", id));
                self.send(self.client.put(&url).json(doc), &url)?;
                Ok(id.clone())
            }
            None => {
                let url = self.url("/nodes");
                let response = self.send(self.client.post(&url).json(doc), &url)?;
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|l| l.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                let id = location.rsplit('/').next().unwrap_or_default().to_owned();
                if id.is_empty() {
                    anyhow::bail!("no node id in response to {}", url);
                }
                Ok(id)
            }
        }
    }

    fn delete(&self, doc: &Document) -> Result<()> {
        let url = self.url(&format!("/nodes/{}", doc.id()));
        self.send(self.client.delete(&url), &url)?;
        Ok(())
    }
}
