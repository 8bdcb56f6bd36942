pub mod contact;
pub mod email;

pub use contact::{Contact, UpsertContactsRequest};
pub use email::{
    Attachment, Content, EmailAddress, EmailMessage, MailSendRequest, Personalization,
    Recipients, SendResult,
};
