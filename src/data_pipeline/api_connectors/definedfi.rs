// src/data_pipeline/api_connectors/definedfi.rs

use crate::{
    data_pipeline::{PairMetadataProvider, PairQuote, TokenInfoProvider, TokenMetadata},
    decoders::{QuoteSide, SocialLinks},
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use solana_sdk::pubkey::Pubkey;

// --- Structures de réponse GraphQL ---

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: Option<TokenNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenNode {
    symbol: Option<String>,
    name: Option<String>,
    is_scam: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    total_supply: String,
    creator_address: Option<String>,
    social_links: Option<SocialLinksNode>,
}

#[derive(Debug, Deserialize)]
struct SocialLinksNode {
    website: Option<String>,
    telegram: Option<String>,
    twitter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairData {
    pair_metadata: Option<PairNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairNode {
    pair_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    liquidity: f64,
}

/// L'API renvoie les montants tantôt en nombre, tantôt en chaîne.
/// Tout le reste (null, objet...) vaut 0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Client GraphQL de definedfi (infos token + métadonnées de paire).
#[derive(Clone)]
pub struct DefinedFiClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    network_id: u64,
}

impl DefinedFiClient {
    pub fn new(http: reqwest::Client, url: String, api_key: String, network_id: u64) -> Self {
        Self { http, url, api_key, network_id }
    }

    pub fn token_query(&self, token: &Pubkey) -> String {
        format!(
            "query GetTokenQuery {{ token(input: {{ address: \"{}\", networkId: {} }}) \
             {{ symbol name isScam totalSupply creatorAddress socialLinks {{ website telegram twitter }} }} }}",
            token, self.network_id
        )
    }

    pub fn pair_query(&self, pair_id: &Pubkey, quote: QuoteSide) -> String {
        format!(
            "query GetPairMetadataQuery {{ pairMetadata(pairId: \"{}:{}\", quoteToken: {}) \
             {{ pairAddress price liquidity }} }}",
            pair_id,
            self.network_id,
            quote.as_str()
        )
    }

    async fn post_graphql(&self, query: String) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .header("Authorization", &self.api_key)
            .json(&json!({ "query": query }))
            .send()
            .await
            .context("Appel definedfi échoué")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Erreur API definedfi: {} - {}", status, error_body));
        }
        response.text().await.context("Lecture de la réponse definedfi échouée")
    }
}

fn parse_graphql<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: GraphQlResponse<T> =
        serde_json::from_str(body).context("Réponse definedfi illisible")?;
    match response.data {
        Some(data) => Ok(data),
        None => {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            bail!("Réponse definedfi sans données : {}", messages.join(", "))
        }
    }
}

pub fn parse_token_response(body: &str) -> Result<TokenMetadata> {
    let token = parse_graphql::<TokenData>(body)?
        .token
        .ok_or_else(|| anyhow!("Token inconnu de definedfi"))?;
    let socials = token.social_links.map_or_else(SocialLinks::default, |links| SocialLinks {
        website: non_empty(links.website),
        telegram: non_empty(links.telegram),
        twitter: non_empty(links.twitter),
    });
    Ok(TokenMetadata {
        symbol: token.symbol.unwrap_or_default(),
        name: token.name.unwrap_or_default(),
        is_scam: token.is_scam,
        total_supply: token.total_supply,
        creator_address: token.creator_address.unwrap_or_default(),
        socials,
    })
}

pub fn parse_pair_response(body: &str) -> Result<PairQuote> {
    let pair = parse_graphql::<PairData>(body)?
        .pair_metadata
        .ok_or_else(|| anyhow!("Paire inconnue de definedfi"))?;
    Ok(PairQuote {
        pair_address: pair.pair_address.unwrap_or_default(),
        price: pair.price,
        liquidity: pair.liquidity,
    })
}

#[async_trait]
impl TokenInfoProvider for DefinedFiClient {
    async fn token_info(&self, token: &Pubkey) -> Result<TokenMetadata> {
        let body = self.post_graphql(self.token_query(token)).await?;
        parse_token_response(&body).with_context(|| format!("Infos token indisponibles pour {}", token))
    }
}

#[async_trait]
impl PairMetadataProvider for DefinedFiClient {
    async fn pair_metadata(&self, pair_id: &Pubkey, quote: QuoteSide) -> Result<PairQuote> {
        let body = self.post_graphql(self.pair_query(pair_id, quote)).await?;
        parse_pair_response(&body).with_context(|| format!("Métadonnées de paire indisponibles pour {}", pair_id))
    }
}
