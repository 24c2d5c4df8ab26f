// DANS : src/filtering/name_check.rs

/// Mots "meme" trop courants pour qu'un token qui les porte soit intéressant.
pub const DEFAULT_BAN_WORDS: &[&str] = &[
    "Dog", "Wif", "Hat", "Rico", "SOL", "Toshi", "Trump", "Biden", "Putin", "SBF", "Cat", "Pepe",
    "Brett", "Normie", "Test", "Help", "Hope", "MAGA", "Baby", "Shib", "Musk", "Elon", "Pink",
    "Ansem", "Mew", "Boden", "WALLY", "Garfield", "Bonk", "tremp", "Drake", "Meow", "May",
    "Grumpy", "Slurp",
];

/// Heuristique sur le symbole et le nom : sous-chaîne, insensible à la casse.
#[derive(Debug, Clone)]
pub struct NameCheck {
    enabled: bool,
    words: Vec<String>,
}

impl NameCheck {
    pub fn new(enabled: bool, words: &[String]) -> Self {
        let mut words: Vec<String> = words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.dedup();
        Self { enabled, words }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Le mot banni trouvé, s'il y en a un.
    pub fn banned_word(&self, symbol: &str, name: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let symbol = symbol.to_lowercase();
        let name = name.to_lowercase();
        self.words
            .iter()
            .find(|w| symbol.contains(w.as_str()) || name.contains(w.as_str()))
            .map(String::as_str)
    }
}
