use std::{error, fmt};

use crate::ReachId;

/// Everything that can stop `divide_polygon`. There's never a partial result.
pub enum PartitionError {
    /// No reaches at all
    EmptyCenterline,
    /// A reach with no length
    DegenerateReach(ReachId),
    InvalidParameter { name: &'static str, value: f64 },
    /// The input geometry doesn't fit together: the centerline misses the polygon, some region
    /// can't be attributed to any reach, or polygonizing produced nothing.
    Topology(String),
    /// Writing intermediate geometry failed
    Scratch(anyhow::Error),
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PartitionError::EmptyCenterline => write!(f, "the centerline has no reaches"),
            PartitionError::DegenerateReach(id) => {
                write!(f, "reach {} has no length", id)
            }
            PartitionError::InvalidParameter { name, value } => {
                write!(f, "{} = {} must be positive and finite", name, value)
            }
            PartitionError::Topology(msg) => write!(f, "bad input topology: {}", msg),
            PartitionError::Scratch(err) => write!(f, "scratch workspace: {:#}", err),
        }
    }
}

impl fmt::Debug for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Do the same thing as the Display trait
        write!(f, "{}", self)
    }
}

impl error::Error for PartitionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            PartitionError::Scratch(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
