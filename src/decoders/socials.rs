// DANS : src/decoders/socials.rs

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r#"https?://[^\s"'<>()\[\]]+"#).unwrap();
}

/// Liens sociaux d'un token. Chaque champ est `None` quand rien n'a été trouvé.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
}

impl SocialLinks {
    pub fn is_complete(&self) -> bool {
        self.website.is_some() && self.telegram.is_some() && self.twitter.is_some()
    }
}

/// Télécharge le JSON pointé par l'URI des métadonnées et en extrait les liens.
/// Toute erreur (URI vide, réseau, JSON invalide) donne des liens vides.
pub async fn fetch_social_links(http: &reqwest::Client, uri: &str) -> SocialLinks {
    if uri.is_empty() {
        return SocialLinks::default();
    }
    let body = match http.get(uri).send().await {
        Ok(response) if response.status().is_success() => response.json::<Value>().await,
        Ok(response) => {
            debug!(uri, status = %response.status(), "[Socials] URI de métadonnées injoignable");
            return SocialLinks::default();
        }
        Err(e) => {
            debug!(uri, error = %e, "[Socials] URI de métadonnées injoignable");
            return SocialLinks::default();
        }
    };
    match body {
        Ok(json) => extract_social_links(&json),
        Err(e) => {
            debug!(uri, error = %e, "[Socials] JSON de métadonnées invalide");
            SocialLinks::default()
        }
    }
}

/// Les champs explicites (à la racine ou sous `extensions`) priment ;
/// ce qui manque encore est cherché dans le texte libre de `description`.
pub fn extract_social_links(json: &Value) -> SocialLinks {
    let explicit = |key: &str| {
        [json.get(key), json.get("extensions").and_then(|ext| ext.get(key))]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut links = SocialLinks {
        website: explicit("website"),
        telegram: explicit("telegram"),
        twitter: explicit("twitter"),
    };
    if links.is_complete() {
        return links;
    }

    if let Some(description) = json.get("description").and_then(Value::as_str) {
        let found = classify_urls(description);
        links.website = links.website.or(found.website);
        links.telegram = links.telegram.or(found.telegram);
        links.twitter = links.twitter.or(found.twitter);
    }
    links
}

/// Un lien `t.me` est Telegram, `twitter`/`x.com` est Twitter (le premier de chaque
/// gagne, les suivants sont jetés) ; la dernière URL restante est le site web.
pub fn classify_urls(text: &str) -> SocialLinks {
    let mut links = SocialLinks::default();
    for url in URL_RE.find_iter(text).map(|m| m.as_str().trim_end_matches(['.', ',', ';'])) {
        if url.contains("t.me") {
            links.telegram.get_or_insert_with(|| url.to_string());
        } else if url.contains("twitter") || url.contains("x.com") {
            links.twitter.get_or_insert_with(|| url.to_string());
        } else {
            links.website = Some(url.to_string());
        }
    }
    links
}
