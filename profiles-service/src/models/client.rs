use serde::Deserialize;
use std::collections::BTreeMap;

/// A relying party allowed to use the authorization proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    /// The first entry is the canonical redirect URI.
    pub redirect_uris: Vec<String>,
}

impl Client {
    pub fn canonical_redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }

    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }
}

/// Shape of one entry in the clients file, keyed by client name.
#[derive(Debug, Deserialize)]
pub struct ClientEntry {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Deprecated single-URI form.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Clients {
    clients: Vec<Client>,
}

impl Clients {
    pub fn new(clients: Vec<Client>) -> Self {
        Self { clients }
    }

    pub fn from_entries(entries: BTreeMap<String, ClientEntry>) -> Self {
        let clients = entries
            .into_iter()
            .map(|(name, entry)| {
                let mut redirect_uris = entry.redirect_uris;
                if redirect_uris.is_empty() {
                    if let Some(uri) = entry.redirect_uri {
                        tracing::warn!(
                            client = %name,
                            "Client uses the deprecated redirect_uri key, use redirect_uris"
                        );
                        redirect_uris.push(uri);
                    }
                }

                Client {
                    name,
                    client_id: entry.client_id,
                    client_secret: entry.client_secret,
                    redirect_uris,
                }
            })
            .collect();

        Self { clients }
    }

    pub fn find(&self, client_id: &str) -> Option<&Client> {
        self.clients
            .iter()
            .find(|client| client.client_id == client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
