use std::{error::Error, fmt::Display};

#[derive(Debug, PartialEq, Eq)]
pub enum Yt2InvError {
    NoAlternatives,
    NoVideoId,
    BadPick(usize, usize),
    DirectoryTimeout,
    ProbeTimeout,
}

impl Display for Yt2InvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAlternatives => write!(f, "No alternatives available"),
            Self::NoVideoId => write!(f, "Not a recognized YouTube video URL"),
            Self::BadPick(pick, len) => {
                write!(f, "Invalid pick {pick}, expected a number between 1 and {len}")
            }
            Self::DirectoryTimeout => write!(f, "Instance directory request timed out"),
            Self::ProbeTimeout => write!(f, "Health probe timed out"),
        }
    }
}

impl Error for Yt2InvError {}
