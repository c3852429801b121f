use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateCardResponse {
    pub card_public_id: String,
    pub invalidated: bool,
}
