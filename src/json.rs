//! JSON session values on top of any [`Overseer`].
//!
//! The whole session is one [`Envelope`] serialized as
//! `{"Value": ..., "Flash": {...}}`. Every mutation reads the envelope,
//! changes one part and writes the whole thing back.
//!
//! - [`get`] / [`set`] / [`del`] work on a string map stored under `Value`.
//! - [`get_obj`] / [`set_obj`] replace that map with an arbitrary value.
//! - [`add_flash`] / [`get_flash`] and their `_obj` forms manage one-shot
//!   messages under `Flash`. Reading a flash removes it.
//!
//! # Examples
//!
//! ```
//! use session_overseer::overseer::CookieOverseer;
//! use session_overseer::session::{CookieBuffer, CookieOptions};
//! use session_overseer::{json, make_secret_key};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> session_overseer::Result<()> {
//! let overseer = CookieOverseer::new(CookieOptions::new(), &make_secret_key())?;
//! let cookies = CookieBuffer::new();
//!
//! json::set(&overseer, &cookies, "user", "alice").await?;
//! assert_eq!(json::get(&overseer, &cookies, "user").await?, "alice");
//!
//! json::add_flash(&overseer, &cookies, "notice", "saved").await?;
//! assert_eq!(json::get_flash(&overseer, &cookies, "notice").await?, "saved");
//! assert!(json::get_flash(&overseer, &cookies, "notice").await.is_err());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OverseerError;
use crate::overseer::Overseer;
use crate::session::CookieBuffer;
use crate::Result;

/// Full contents of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Persistent data, absent until the first write.
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
    /// One-shot messages keyed by name.
    #[serde(rename = "Flash", default)]
    pub flash: Option<BTreeMap<String, Value>>,
}

impl Envelope {
    fn value_map(&self) -> Result<BTreeMap<String, String>> {
        match &self.value {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    fn set_value_map(&mut self, map: &BTreeMap<String, String>) -> Result<()> {
        self.value = Some(serde_json::to_value(map)?);
        Ok(())
    }

    fn take_flash(&mut self, key: &str) -> Option<Value> {
        self.flash.as_mut()?.remove(key)
    }
}

/// Read and decode the session envelope.
pub async fn load<O>(overseer: &O, cookies: &CookieBuffer) -> Result<Envelope>
where
    O: Overseer + ?Sized,
{
    let raw = overseer.get(cookies).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Encode and write the whole envelope.
pub async fn store<O>(overseer: &O, cookies: &CookieBuffer, envelope: &Envelope) -> Result<()>
where
    O: Overseer + ?Sized,
{
    let raw = serde_json::to_string(envelope)?;
    overseer.set(cookies, &raw).await
}

async fn load_or_empty<O>(overseer: &O, cookies: &CookieBuffer) -> Result<Envelope>
where
    O: Overseer + ?Sized,
{
    match load(overseer, cookies).await {
        Err(OverseerError::NoSession) => Ok(Envelope::default()),
        other => other,
    }
}

/// Value stored under `key`.
pub async fn get<O>(overseer: &O, cookies: &CookieBuffer, key: &str) -> Result<String>
where
    O: Overseer + ?Sized,
{
    let envelope = load(overseer, cookies).await?;
    envelope
        .value_map()?
        .remove(key)
        .ok_or_else(|| OverseerError::NoMapKey(key.to_string()))
}

/// Store `value` under `key`, creating the session if needed.
pub async fn set<O>(overseer: &O, cookies: &CookieBuffer, key: &str, value: &str) -> Result<()>
where
    O: Overseer + ?Sized,
{
    let mut envelope = load_or_empty(overseer, cookies).await?;
    let mut map = envelope.value_map()?;
    map.insert(key.to_string(), value.to_string());
    envelope.set_value_map(&map)?;
    store(overseer, cookies, &envelope).await
}

/// Remove `key`. Missing sessions and keys are not an error.
pub async fn del<O>(overseer: &O, cookies: &CookieBuffer, key: &str) -> Result<()>
where
    O: Overseer + ?Sized,
{
    let mut envelope = match load(overseer, cookies).await {
        Err(OverseerError::NoSession) => return Ok(()),
        other => other?,
    };

    let mut map = envelope.value_map()?;
    if map.remove(key).is_none() {
        return Ok(());
    }
    envelope.set_value_map(&map)?;
    store(overseer, cookies, &envelope).await
}

/// Decode the whole `Value` as `T`.
///
/// Returns [`OverseerError::NoMapKey`] when nothing has been stored yet.
pub async fn get_obj<O, T>(overseer: &O, cookies: &CookieBuffer) -> Result<T>
where
    O: Overseer + ?Sized,
    T: DeserializeOwned,
{
    let envelope = load(overseer, cookies).await?;
    match envelope.value {
        None | Some(Value::Null) => Err(OverseerError::NoMapKey("Value".into())),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Replace the whole `Value` with `value`.
pub async fn set_obj<O, T>(overseer: &O, cookies: &CookieBuffer, value: &T) -> Result<()>
where
    O: Overseer + ?Sized,
    T: Serialize + Sync + ?Sized,
{
    let encoded = serde_json::to_value(value)?;
    let mut envelope = load_or_empty(overseer, cookies).await?;
    envelope.value = Some(encoded);
    store(overseer, cookies, &envelope).await
}

/// Queue a string flash message under `key`.
pub async fn add_flash<O>(overseer: &O, cookies: &CookieBuffer, key: &str, value: &str) -> Result<()>
where
    O: Overseer + ?Sized,
{
    add_flash_obj(overseer, cookies, key, value).await
}

/// Read and remove the string flash message under `key`.
pub async fn get_flash<O>(overseer: &O, cookies: &CookieBuffer, key: &str) -> Result<String>
where
    O: Overseer + ?Sized,
{
    get_flash_obj(overseer, cookies, key).await
}

/// Queue any serializable flash message under `key`.
pub async fn add_flash_obj<O, T>(
    overseer: &O,
    cookies: &CookieBuffer,
    key: &str,
    value: &T,
) -> Result<()>
where
    O: Overseer + ?Sized,
    T: Serialize + Sync + ?Sized,
{
    let encoded = serde_json::to_value(value)?;
    let mut envelope = load_or_empty(overseer, cookies).await?;
    envelope
        .flash
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), encoded);
    store(overseer, cookies, &envelope).await
}

/// Read and remove the flash message under `key`.
///
/// The message is only removed once it decodes as `T`; a second read returns
/// [`OverseerError::NoMapKey`].
pub async fn get_flash_obj<O, T>(overseer: &O, cookies: &CookieBuffer, key: &str) -> Result<T>
where
    O: Overseer + ?Sized,
    T: DeserializeOwned,
{
    let mut envelope = load(overseer, cookies).await?;
    let raw = envelope
        .take_flash(key)
        .ok_or_else(|| OverseerError::NoMapKey(key.to_string()))?;

    let decoded = serde_json::from_value(raw)?;
    store(overseer, cookies, &envelope).await?;
    Ok(decoded)
}
