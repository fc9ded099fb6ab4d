//! Profile editing conversation.
//!
//! ```text
//! Viewing --edit--> Choosing --field--> Editing(field) --valid text--> Viewing
//!                   Choosing --back---> Viewing
//!                                       Editing(field) --invalid text--> Editing(field)
//! any state --cancel--> Viewing
//! ```

use chrono::{DateTime, Utc};
use std::fmt;

use crate::bot::user::Profile;

pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_LOCATION_CHARS: usize = 100;
pub const MAX_INTERESTS: usize = 10;
pub const MAX_INTEREST_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Bio,
    Location,
    Interests,
}

impl ProfileField {
    /// Parse the callback payload of a field button (`edit_bio`, ...).
    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            "edit_bio" => Some(Self::Bio),
            "edit_location" => Some(Self::Location),
            "edit_interests" => Some(Self::Interests),
            _ => None,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Bio => "✏️ Please enter your new bio (max 500 characters):",
            Self::Location => "📍 Please enter your location (e.g., City, Country):",
            Self::Interests => "🎯 Please enter your interests, separated by commas (e.g., music, sports, reading):",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Viewing,
    Choosing,
    Editing(ProfileField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileInput<'a> {
    Edit,
    Choose(ProfileField),
    Back,
    Text(&'a str),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BioTooLong,
    LocationTooLong,
    TooManyInterests,
    InterestTooLong,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BioTooLong => write!(f, "❌ Bio is too long! Maximum {MAX_BIO_CHARS} characters."),
            Self::LocationTooLong => write!(f, "❌ Location is too long! Maximum {MAX_LOCATION_CHARS} characters."),
            Self::TooManyInterests => write!(f, "❌ You can have a maximum of {MAX_INTERESTS} interests."),
            Self::InterestTooLong => write!(f, "❌ Each interest must be {MAX_INTEREST_CHARS} characters or less."),
        }
    }
}

/// A validated value ready to be written to the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileUpdate {
    Bio(String),
    Location(String),
    Interests(Vec<String>),
}

impl ProfileUpdate {
    pub fn apply(self, profile: &mut Profile, now: DateTime<Utc>) {
        match self {
            Self::Bio(bio) => profile.bio = bio,
            Self::Location(location) => profile.location = location,
            Self::Interests(interests) => profile.interests = interests,
        }
        profile.last_activity = now;
    }

    pub fn confirmation(&self) -> String {
        match self {
            Self::Bio(_) => "✅ Bio updated successfully!".to_string(),
            Self::Location(_) => "📍 Location updated successfully!".to_string(),
            Self::Interests(list) => format!("🎯 Updated {} interests!", list.len()),
        }
    }
}

/// Check raw text against a field's constraints. Lengths are in characters.
pub fn validate(field: ProfileField, text: &str) -> Result<ProfileUpdate, ValidationError> {
    let value = text.trim();
    match field {
        ProfileField::Bio => {
            if value.chars().count() > MAX_BIO_CHARS {
                return Err(ValidationError::BioTooLong);
            }
            Ok(ProfileUpdate::Bio(value.to_string()))
        }
        ProfileField::Location => {
            if value.chars().count() > MAX_LOCATION_CHARS {
                return Err(ValidationError::LocationTooLong);
            }
            Ok(ProfileUpdate::Location(value.to_string()))
        }
        ProfileField::Interests => {
            let interests: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if interests.len() > MAX_INTERESTS {
                return Err(ValidationError::TooManyInterests);
            }
            if interests.iter().any(|i| i.chars().count() > MAX_INTEREST_CHARS) {
                return Err(ValidationError::InterestTooLong);
            }
            Ok(ProfileUpdate::Interests(interests))
        }
    }
}

/// What the caller has to do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEffect {
    ShowFieldPicker,
    Prompt(ProfileField),
    ShowProfile,
    Rejected(ValidationError),
    Save(ProfileUpdate),
    Cancelled,
    /// Input not meaningful in the current state.
    Ignored,
}

/// Advance the conversation. `None` means no conversation is active.
pub fn step(state: Option<ProfileState>, input: ProfileInput<'_>) -> (Option<ProfileState>, ProfileEffect) {
    use ProfileEffect as E;
    use ProfileState as S;

    match (state, input) {
        (Some(_), ProfileInput::Cancel) => (Some(S::Viewing), E::Cancelled),
        (Some(S::Viewing), ProfileInput::Edit) => (Some(S::Choosing), E::ShowFieldPicker),
        (Some(S::Choosing), ProfileInput::Choose(field)) => (Some(S::Editing(field)), E::Prompt(field)),
        (Some(S::Choosing), ProfileInput::Back) => (Some(S::Viewing), E::ShowProfile),
        (Some(S::Editing(field)), ProfileInput::Text(text)) => match validate(field, text) {
            Ok(update) => (Some(S::Viewing), E::Save(update)),
            Err(e) => (Some(S::Editing(field)), E::Rejected(e)),
        },
        (state, _) => (state, E::Ignored),
    }
}
