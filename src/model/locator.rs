//! Finds a described UI element on screen with a vision model.

use thiserror::Error;

use super::client::{GenerateRequest, ModelClient, ModelError};
use crate::config::locate_prompt;
use crate::device::Resolution;
use crate::vision::coordinates::{parse_relative, resolve, AbsoluteCoordinate, CoordinateError};
use crate::vision::NormalizedImage;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("vision model failed: {0}")]
    Model(#[from] ModelError),
    #[error("unusable coordinates from vision model: {0}")]
    Coordinate(#[from] CoordinateError),
}

/// Asks a vision model for `[x%, y%]` and scales it to device pixels.
pub struct ElementLocator {
    client: ModelClient,
}

impl ElementLocator {
    /// Locate elements with `client`'s model.
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Find `query` on `image` and return its centre in device pixels.
    pub async fn locate(
        &self,
        query: &str,
        image: &NormalizedImage,
        resolution: Resolution,
    ) -> Result<AbsoluteCoordinate, LocateError> {
        let prompt = locate_prompt(query);
        let reply = self
            .client
            .generate(&GenerateRequest {
                system: None,
                prompt: &prompt,
                image: Some(image),
                json: false,
            })
            .await?;
        tracing::debug!(query, reply = %reply.trim(), "locator reply");
        coordinates_from_reply(&reply, resolution)
    }
}

fn coordinates_from_reply(
    reply: &str,
    resolution: Resolution,
) -> Result<AbsoluteCoordinate, LocateError> {
    let relative = parse_relative(reply.trim())?;
    Ok(resolve(relative, resolution))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_scaled_to_device() {
        let res = Resolution::new(1080, 2400);
        let abs = coordinates_from_reply(" [50%, 25%]\n", res).unwrap();
        assert_eq!(abs, AbsoluteCoordinate { x: 540, y: 600 });
    }

    #[test]
    fn test_prose_reply_rejected() {
        let res = Resolution::new(1080, 2400);
        assert!(matches!(
            coordinates_from_reply("It is near the top.", res),
            Err(LocateError::Coordinate(_))
        ));
    }
}
