use std::{
    fmt::{self, Display},
    ops::Deref,
};

use mailparse::{MailAddr, SingleInfo, addrparse};
use serde::{Deserialize, Serialize};

use crate::address_parser::{AddressError, Mailbox, parse_mailbox};

/// One destination: a display name and a mailbox that was valid when added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientAddress {
    name: String,
    mailbox: Mailbox,
}

impl RecipientAddress {
    /// Builds a recipient from a display name and a bare mailbox.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` if `address` is not a bare mailbox.
    pub fn new(name: impl Into<String>, address: &str) -> Result<Self, AddressError> {
        Ok(Self {
            name: name.into(),
            mailbox: parse_mailbox(address)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// The `local@domain` form used on the wire.
    #[must_use]
    pub fn address(&self) -> String {
        self.mailbox.to_string()
    }

    fn from_single(input: &str, info: SingleInfo) -> Result<Self, AddressError> {
        let mailbox = parse_mailbox(&info.addr).map_err(|e| AddressError::Malformed {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            name: info.display_name.unwrap_or_default(),
            mailbox,
        })
    }
}

impl Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            Display::fmt(&self.mailbox, f)
        } else {
            let escaped = self.name.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "\"{escaped}\" <{}>", self.mailbox)
        }
    }
}

/// Parses one RFC 5322 address string into every mailbox it names.
fn parse_rfc5322(input: &str) -> Result<Vec<RecipientAddress>, AddressError> {
    if input.trim().is_empty() {
        return Err(AddressError::Empty);
    }

    let list = addrparse(input).map_err(|e| AddressError::Malformed {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    let mut parsed = Vec::with_capacity(list.len());
    for addr in list.iter().cloned() {
        match addr {
            MailAddr::Single(info) => parsed.push(RecipientAddress::from_single(input, info)?),
            MailAddr::Group(group) => {
                for info in group.addrs {
                    parsed.push(RecipientAddress::from_single(input, info)?);
                }
            }
        }
    }

    if parsed.is_empty() {
        return Err(AddressError::Empty);
    }

    Ok(parsed)
}

/// The ordered recipient list of a sender.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AddressBook(Vec<RecipientAddress>);

impl AddressBook {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a single recipient whose `address` must be a bare mailbox.
    ///
    /// # Errors
    ///
    /// Returns `AddressError` and leaves the list untouched if `address`
    /// is not a bare mailbox.
    pub fn add_recipient(
        &mut self,
        name: impl Into<String>,
        address: &str,
    ) -> Result<(), AddressError> {
        let recipient = RecipientAddress::new(name, address)?;
        tracing::debug!(recipient = %recipient, "Added recipient");
        self.0.push(recipient);
        Ok(())
    }

    /// Appends every mailbox named by `addresses`, in order.
    ///
    /// Each entry may carry a display name (`Name <local@domain>`). Nothing
    /// is appended unless every entry parses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NoAddresses` for an empty slice, otherwise the
    /// error of the first entry that fails to parse.
    pub fn add_recipients<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<(), AddressError> {
        if addresses.is_empty() {
            return Err(AddressError::NoAddresses);
        }

        let mut parsed = Vec::with_capacity(addresses.len());
        for address in addresses {
            parsed.extend(parse_rfc5322(address.as_ref())?);
        }

        tracing::debug!(count = parsed.len(), "Added recipients");
        self.0.extend(parsed);
        Ok(())
    }

    pub fn reset_recipients(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn as_slice(&self) -> &[RecipientAddress] {
        &self.0
    }
}

impl Deref for AddressBook {
    type Target = [RecipientAddress];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for AddressBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, recipient) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            Display::fmt(recipient, f)?;
        }
        Ok(())
    }
}

impl From<Vec<RecipientAddress>> for AddressBook {
    fn from(value: Vec<RecipientAddress>) -> Self {
        Self(value)
    }
}

impl TryFrom<Vec<String>> for AddressBook {
    type Error = AddressError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        let mut book = Self::new();
        if !value.is_empty() {
            book.add_recipients(&value)?;
        }
        Ok(book)
    }
}

impl From<AddressBook> for Vec<String> {
    fn from(value: AddressBook) -> Self {
        value.iter().map(ToString::to_string).collect()
    }
}
