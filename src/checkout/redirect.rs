//! Gateway redirect URLs.
//!
//! The payer leaves for the gateway and comes back to one of two landing
//! pages. The success URL carries a placeholder the gateway replaces with the
//! session id, so the landing page can look the session up.

use crate::backend::{MediaId, SessionId};
use crate::error::{Error, Result};
use reqwest::Url;

/// Path of the landing page after a completed payment.
pub const SUCCESS_PATH: &str = "/payment-success";

/// Path of the landing page after an abandoned payment.
pub const CANCEL_PATH: &str = "/payment-failure";

/// Placeholder the gateway substitutes with the session id.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

const MEDIA_PARAM: &str = "mediaId";
const SESSION_PARAM: &str = "session_id";

/// Success and cancel URLs for one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectUrls {
    /// Where the gateway sends a payer after paying.
    pub success_url: String,
    /// Where the gateway sends a payer who backs out.
    pub cancel_url: String,
}

impl RedirectUrls {
    /// Build the landing URLs for a donation to `media_id`.
    ///
    /// Landing paths are joined onto any base path of `origin`, so an app
    /// served under `https://host/app` lands on `/app/payment-success`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `origin` is not an absolute URL.
    pub fn for_media(origin: &str, media_id: &MediaId) -> Result<Self> {
        let base = Url::parse(origin)
            .map_err(|e| Error::Validation(format!("invalid checkout origin {origin}: {e}")))?;
        let base_path = base.path().trim_end_matches('/').to_string();

        let landing = |path: &str| {
            let mut url = base.clone();
            url.set_path(&format!("{base_path}{path}"));
            url.set_query(None);
            url.query_pairs_mut()
                .append_pair(MEDIA_PARAM, media_id.as_str());
            url
        };

        // Appended verbatim: encoding the braces would stop the gateway
        // from recognising the placeholder.
        let success_url = format!(
            "{}&{SESSION_PARAM}={SESSION_ID_PLACEHOLDER}",
            landing(SUCCESS_PATH)
        );
        let cancel_url = landing(CANCEL_PATH).to_string();

        Ok(Self {
            success_url,
            cancel_url,
        })
    }
}

/// Which landing page the payer arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The success landing page.
    Success,
    /// The cancel landing page.
    Cancel,
}

/// A payer's arrival back from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectArrival {
    /// Landing page.
    pub target: RedirectTarget,
    /// Media the payment was for, if the URL carried it.
    pub media_id: Option<MediaId>,
    /// Session id substituted by the gateway, if any.
    pub session_id: Option<SessionId>,
}

impl RedirectArrival {
    /// Parse a landing URL.
    ///
    /// Blank parameters and an unsubstituted placeholder count as absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the URL is malformed or is not one of
    /// the two landing pages.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid redirect URL {url}: {e}")))?;

        let path = parsed.path().trim_end_matches('/');
        let target = if path.ends_with(SUCCESS_PATH) {
            RedirectTarget::Success
        } else if path.ends_with(CANCEL_PATH) {
            RedirectTarget::Cancel
        } else {
            return Err(Error::Validation(format!(
                "not a payment landing page: {path}"
            )));
        };

        let param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty() && v != SESSION_ID_PLACEHOLDER)
        };

        let session_id = param(SESSION_PARAM);
        if let Some(ref id) = session_id {
            if !is_session_token(id) {
                return Err(Error::Validation(format!("malformed session id {id:?}")));
            }
        }

        Ok(Self {
            target,
            media_id: param(MEDIA_PARAM).map(MediaId::from),
            session_id: session_id.map(SessionId::from),
        })
    }
}

/// Gateway session ids are ASCII alphanumerics, `_` and `-`.
fn is_session_token(id: &str) -> bool {
    id.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
