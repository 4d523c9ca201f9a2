use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::{TOTAL_CARDS, Team};
use crate::error::GameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardColor {
    Red,
    Blue,
    Neutral,
    Death,
}

const DECK_COMPOSITION: [(CardColor, usize); 4] = [
    (CardColor::Red, 9),
    (CardColor::Blue, 8),
    (CardColor::Death, 1),
    (CardColor::Neutral, 7),
];

impl CardColor {
    pub fn as_str(self) -> &'static str {
        match self {
            CardColor::Red => "red",
            CardColor::Blue => "blue",
            CardColor::Neutral => "neutral",
            CardColor::Death => "black",
        }
    }

    /// The team that scores from this color, if any.
    pub fn team(self) -> Option<Team> {
        match self {
            CardColor::Red => Some(Team::Red),
            CardColor::Blue => Some(Team::Blue),
            CardColor::Neutral | CardColor::Death => None,
        }
    }
}

impl From<Team> for CardColor {
    fn from(team: Team) -> Self {
        match team {
            Team::Red => CardColor::Red,
            Team::Blue => CardColor::Blue,
        }
    }
}

impl fmt::Display for CardColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CardColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A card keeps its color after it is turned over; only the tag changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Unrevealed(CardColor),
    Revealed(CardColor),
}

impl CardStatus {
    pub fn color(self) -> CardColor {
        match self {
            CardStatus::Unrevealed(color) | CardStatus::Revealed(color) => color,
        }
    }

    pub fn is_revealed(self) -> bool {
        matches!(self, CardStatus::Revealed(_))
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardStatus::Unrevealed(color) => write!(f, "{color}"),
            CardStatus::Revealed(color) => write!(f, "guessed-{color}"),
        }
    }
}

impl Serialize for CardStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Unrevealed words split by whether they belong to a given team.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClueWords {
    pub mine: Vec<String>,
    pub others: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Deck {
    cards: BTreeMap<String, CardStatus>,
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_uppercase()
}

impl Deck {
    /// Draws 25 distinct words and pairs them with a shuffled color multiset.
    pub fn deal_cards<R: Rng + ?Sized>(words: &[String], rng: &mut R) -> Result<Self, GameError> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = words
            .iter()
            .map(|word| normalize_word(word))
            .filter(|word| !word.is_empty() && seen.insert(word.clone()))
            .collect();

        if distinct.len() < TOTAL_CARDS {
            return Err(GameError::NotEnoughWords {
                available: distinct.len(),
                required: TOTAL_CARDS,
            });
        }

        let chosen: Vec<String> = distinct
            .choose_multiple(rng, TOTAL_CARDS)
            .cloned()
            .collect();

        let mut colors: Vec<CardColor> = DECK_COMPOSITION
            .iter()
            .flat_map(|&(color, count)| std::iter::repeat_n(color, count))
            .collect();
        colors.shuffle(rng);

        Ok(Self::from_cards(chosen.into_iter().zip(colors)))
    }

    pub fn from_cards<I>(cards: I) -> Self
    where
        I: IntoIterator<Item = (String, CardColor)>,
    {
        Self {
            cards: cards
                .into_iter()
                .map(|(word, color)| (normalize_word(&word), CardStatus::Unrevealed(color)))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn status(&self, word: &str) -> Option<CardStatus> {
        self.cards.get(&normalize_word(word)).copied()
    }

    pub fn is_unrevealed(&self, word: &str) -> bool {
        matches!(self.status(word), Some(CardStatus::Unrevealed(_)))
    }

    /// Turns a card over and returns its color.
    pub fn reveal(&mut self, word: &str) -> Result<CardColor, GameError> {
        let key = normalize_word(word);
        let status = self
            .cards
            .get_mut(&key)
            .ok_or_else(|| GameError::WordNotOnBoard(key.clone()))?;
        match *status {
            CardStatus::Revealed(_) => Err(GameError::CardAlreadyRevealed(key)),
            CardStatus::Unrevealed(color) => {
                *status = CardStatus::Revealed(color);
                Ok(color)
            }
        }
    }

    pub fn clue_words(&self, team: Team) -> ClueWords {
        let mine_color = CardColor::from(team);
        let mut words = ClueWords::default();
        for (word, status) in &self.cards {
            match status {
                CardStatus::Revealed(_) => {}
                CardStatus::Unrevealed(color) if *color == mine_color => {
                    words.mine.push(word.clone())
                }
                CardStatus::Unrevealed(_) => words.others.push(word.clone()),
            }
        }
        words
    }

    pub fn guess_words(&self) -> Vec<String> {
        self.cards
            .iter()
            .filter(|(_, status)| !status.is_revealed())
            .map(|(word, _)| word.clone())
            .collect()
    }

    pub fn cluegiver_view(&self) -> BTreeMap<String, String> {
        self.cards
            .iter()
            .map(|(word, status)| (word.clone(), status.to_string()))
            .collect()
    }

    /// Guessers only see colors that have already been revealed.
    pub fn guesser_view(&self) -> BTreeMap<String, String> {
        self.cards
            .iter()
            .map(|(word, status)| {
                let shown = match status {
                    CardStatus::Unrevealed(_) => "white".to_string(),
                    revealed => revealed.to_string(),
                };
                (word.clone(), shown)
            })
            .collect()
    }

    pub fn colors(&self) -> BTreeMap<String, CardColor> {
        self.cards
            .iter()
            .map(|(word, status)| (word.clone(), status.color()))
            .collect()
    }

    #[cfg(test)]
    pub fn count_color(&self, color: CardColor) -> usize {
        self.cards.values().filter(|s| s.color() == color).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn word_list(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{i}")).collect()
    }

    fn sample_deck() -> Deck {
        let mut cards = Vec::new();
        for i in 0..9 {
            cards.push((format!("red{i}"), CardColor::Red));
        }
        for i in 0..8 {
            cards.push((format!("blue{i}"), CardColor::Blue));
        }
        for i in 0..7 {
            cards.push((format!("plain{i}"), CardColor::Neutral));
        }
        cards.push(("skull".to_string(), CardColor::Death));
        Deck::from_cards(cards)
    }

    #[test]
    fn test_deal_cards_composition() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = Deck::deal_cards(&word_list(400), &mut rng).unwrap();

        assert_eq!(deck.len(), TOTAL_CARDS);
        assert_eq!(deck.count_color(CardColor::Red), 9);
        assert_eq!(deck.count_color(CardColor::Blue), 8);
        assert_eq!(deck.count_color(CardColor::Death), 1);
        assert_eq!(deck.count_color(CardColor::Neutral), 7);
        assert!(deck.guess_words().iter().all(|w| w == &w.to_uppercase()));
    }

    #[test]
    fn test_deal_cards_ignores_duplicates() {
        let mut words = word_list(25);
        words.extend(word_list(25));
        words.push("  WORD3 ".to_string());
        let mut rng = StdRng::seed_from_u64(1);

        let deck = Deck::deal_cards(&words, &mut rng).unwrap();
        assert_eq!(deck.len(), TOTAL_CARDS, "Duplicates must not shrink the deck");
    }

    #[test]
    fn test_deal_cards_rejects_short_list() {
        let mut words = word_list(24);
        words.push("word0".to_string());
        words.push(String::new());
        let mut rng = StdRng::seed_from_u64(3);

        match Deck::deal_cards(&words, &mut rng) {
            Err(GameError::NotEnoughWords { available, required }) => {
                assert_eq!(available, 24);
                assert_eq!(required, 25);
            }
            other => panic!("Expected NotEnoughWords, got {other:?}"),
        }
    }

    #[test]
    fn test_reveal_keeps_card() {
        let mut deck = sample_deck();
        assert_eq!(deck.reveal("red0").unwrap(), CardColor::Red);
        assert_eq!(deck.len(), TOTAL_CARDS);
        assert_eq!(deck.status("RED0"), Some(CardStatus::Revealed(CardColor::Red)));
        assert!(matches!(
            deck.reveal("Red0"),
            Err(GameError::CardAlreadyRevealed(_))
        ));
        assert!(matches!(
            deck.reveal("nowhere"),
            Err(GameError::WordNotOnBoard(_))
        ));
    }

    #[test]
    fn test_status_wire_form() {
        let revealed = CardStatus::Revealed(CardColor::Red).to_string();
        let hidden = CardStatus::Unrevealed(CardColor::Red).to_string();
        assert_eq!(hidden, "red");
        assert_eq!(revealed, "guessed-red");
        assert!(revealed.starts_with("guessed-"));
        assert!(!hidden.starts_with("guessed-"));
        assert_eq!(CardStatus::Unrevealed(CardColor::Death).to_string(), "black");
    }

    #[test]
    fn test_clue_words_partition() {
        let mut deck = sample_deck();
        deck.reveal("red1").unwrap();
        deck.reveal("plain0").unwrap();

        let words = deck.clue_words(Team::Red);
        assert_eq!(words.mine.len(), 8);
        assert_eq!(words.others.len(), 8 + 6 + 1);
        assert!(!words.mine.contains(&"RED1".to_string()));
        assert!(words.others.contains(&"SKULL".to_string()));

        let blue = deck.clue_words(Team::Blue);
        assert_eq!(blue.mine.len(), 8);
        assert!(blue.others.contains(&"RED0".to_string()));
    }

    #[test]
    fn test_guess_words_and_views() {
        let mut deck = sample_deck();
        deck.reveal("blue2").unwrap();

        let guess_words = deck.guess_words();
        assert_eq!(guess_words.len(), 24);
        assert!(!guess_words.contains(&"BLUE2".to_string()));

        let guesser = deck.guesser_view();
        assert_eq!(guesser.get("RED0").map(String::as_str), Some("white"));
        assert_eq!(guesser.get("BLUE2").map(String::as_str), Some("guessed-blue"));

        let cluegiver = deck.cluegiver_view();
        assert_eq!(cluegiver.get("SKULL").map(String::as_str), Some("black"));

        let json = serde_json::to_value(&deck).unwrap();
        assert_eq!(json["BLUE2"], "guessed-blue");
    }
}
