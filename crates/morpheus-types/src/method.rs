use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The method domain from spec.md §3: transport+provider pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    EmailMandrill,
    EmailSes,
    EmailTest,
    SmsMessagebird,
    SmsTest,
}

impl Method {
    pub fn is_sms(self) -> bool {
        matches!(self, Self::SmsMessagebird | Self::SmsTest)
    }

    pub fn is_email(self) -> bool {
        !self.is_sms()
    }
}

/// Narrower enums accepted by the two admission endpoints (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EmailSendMethod {
    EmailMandrill,
    EmailSes,
    EmailTest,
}

impl From<EmailSendMethod> for Method {
    fn from(m: EmailSendMethod) -> Self {
        match m {
            EmailSendMethod::EmailMandrill => Method::EmailMandrill,
            EmailSendMethod::EmailSes => Method::EmailSes,
            EmailSendMethod::EmailTest => Method::EmailTest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SmsSendMethod {
    SmsMessagebird,
    SmsTest,
}

impl From<SmsSendMethod> for Method {
    fn from(m: SmsSendMethod) -> Self {
        match m {
            SmsSendMethod::SmsMessagebird => Method::SmsMessagebird,
            SmsSendMethod::SmsTest => Method::SmsTest,
        }
    }
}
