//! Outbound chat texts
//!
//! Clients match on some of these verbatim (the bundled page starts the
//! download on [`DOWNLOADING_FILES`]), so changes here are protocol changes.

use crate::services::{LookupError, SongMatch};

pub const WELCOME: &str = "Welcome to the stemchat service!";

pub const MENU: &str = "Choose an option:\n\
                        1. Audio Separation\n\
                        2. Finding Info\n\
                        3. Recommend New Songs";

pub const UPLOAD_PROMPT: &str = "You selected Audio Separation. Please upload your file.";

pub const SONG_QUERY_PROMPT: &str =
    "You selected Finding Info. Please enter the song name or part of it to search.";

pub const RECOMMEND_ACK: &str = "You selected Recommend New Songs.";

pub const WAIT_FOR_SEPARATION: &str = "Wait for Separation...";

pub const SEPARATION_FAILED: &str = "An error occurred during separation.";

pub const SEPARATION_COMPLETE: &str = "Separation Complete. Download will start soon.";

pub const DOWNLOADING_FILES: &str = "Downloading files.";

pub const NO_FILE_UPLOADED: &str = "No file uploaded.";

pub const NO_MATCHING_SONGS: &str = "No matching songs found.";

pub const CONTINUE_PROMPT: &str =
    "Do you want to continue with another service with same audio? (yes/no)";

pub const GOODBYE: &str = "Thank you for using our service. Goodbye!";

pub fn unrecognized_option(input: &str) -> String {
    format!("Unrecognized option: {}. Please select 1, 2, or 3.", input)
}

pub fn upload_received(filename: &str) -> String {
    format!("You've uploaded {}.", filename)
}

pub fn file_not_found(filename: &str) -> String {
    format!("File not found: {}.", filename)
}

/// One line per song: `<name> by <artist>, <artist>`
pub fn found_songs(songs: &[SongMatch]) -> String {
    let lines: Vec<String> = songs
        .iter()
        .map(|song| {
            let artists: Vec<&str> = song.artists.iter().map(|a| a.name.as_str()).collect();
            format!("{} by {}", song.name, artists.join(", "))
        })
        .collect();
    format!("Found songs:\n{}", lines.join("\n"))
}

pub fn lookup_failed(error: &LookupError) -> String {
    match error {
        LookupError::Connectivity(detail) => {
            format!("Could not connect to VocaDB API: {}", detail)
        }
        LookupError::Other(detail) => format!("Error during search: {}", detail),
    }
}
