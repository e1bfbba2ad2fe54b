use crate::amf::{Amf0Document, Amf0Object, Amf0Value};
use crate::protocol::constants::*;
use crate::{Error, Result};

/// An AMF0 command: name, transaction id, command object, then arguments.
///
/// Positions follow the document order, so `arguments[0]` is the fourth value
/// on the wire (the stream key of `publish`, for example).
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Option<Amf0Value>,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: None,
            arguments: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: impl Into<Amf0Value>) -> Self {
        self.command_object = Some(object.into());
        self
    }

    pub fn with_argument(mut self, argument: impl Into<Amf0Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn argument(&self, index: usize) -> Option<&Amf0Value> {
        self.arguments.get(index)
    }

    pub fn string_argument(&self, index: usize) -> Option<&str> {
        self.argument(index).and_then(|v| v.as_string())
    }

    /// Status information object used by onStatus and onFCPublish
    pub fn status_object(level: &str, code: &str, description: &str, client_id: f64) -> Amf0Object {
        Amf0Object::new()
            .with("level", level)
            .with("code", code)
            .with("description", description)
            .with("clientid", client_id)
    }

    /// `_result` for connect: server properties plus connection status
    pub fn connect_result(transaction_id: f64, object_encoding: f64, client_id: f64) -> Self {
        let properties = Amf0Object::new()
            .with("fmsVer", FMS_VERSION)
            .with("capabilities", FMS_CAPABILITIES)
            .with("mode", 1.0);

        let information = Amf0Object::new()
            .with("level", LEVEL_STATUS)
            .with("code", CODE_CONNECT_SUCCESS)
            .with("description", "Connection succeeded.")
            .with("clientid", client_id)
            .with("objectEncoding", object_encoding)
            .with(
                "data",
                Amf0Value::EcmaArray(Amf0Object::new().with("version", FMS_DATA_VERSION)),
            );

        RtmpCommand::new(CMD_RESULT, transaction_id)
            .with_object(properties)
            .with_argument(information)
    }

    /// `_result` for createStream carrying the allocated stream id
    pub fn create_stream_result(transaction_id: f64, stream_id: u32) -> Self {
        RtmpCommand::new(CMD_RESULT, transaction_id)
            .with_object(Amf0Value::Null)
            .with_argument(stream_id as f64)
    }

    pub fn on_fc_publish(client_id: f64) -> Self {
        RtmpCommand::new(CMD_ON_FC_PUBLISH, 0.0)
            .with_object(Amf0Value::Null)
            .with_argument(Self::status_object(LEVEL_STATUS, CODE_PUBLISH_START, "FCPublish", client_id))
    }

    /// Create onStatus response
    pub fn on_status(level: &str, code: &str, description: &str, client_id: f64) -> Self {
        RtmpCommand::new(CMD_ON_STATUS, 0.0)
            .with_object(Amf0Value::Null)
            .with_argument(Self::status_object(level, code, description, client_id))
    }

    /// Encode command to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut document = Amf0Document::new()
            .with(self.name.as_str())
            .with(self.transaction_id)
            .with(self.command_object.clone().unwrap_or(Amf0Value::Null));
        for argument in &self.arguments {
            document.push(argument.clone());
        }
        document.encode()
    }

    /// Decode command from an AMF0 command message body
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_document(Amf0Document::decode(data))
    }

    pub fn from_document(document: Amf0Document) -> Result<Self> {
        if document.is_empty() {
            return Err(Error::protocol("Command message decoded to no values"));
        }

        let mut values = document.into_values().into_iter();
        let name = match values.next() {
            Some(Amf0Value::String(name)) => name,
            other => {
                return Err(Error::protocol(format!("Command name must be string, got {:?}", other)));
            }
        };
        let transaction_id = values.next().and_then(|v| v.as_number()).unwrap_or(0.0);
        let command_object = values.next();

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments: values.collect(),
        })
    }
}

// Publisher-side requests, only needed to drive the session in tests
#[cfg(test)]
impl RtmpCommand {
    /// Create connect command
    pub(crate) fn connect(app: &str, tc_url: &str) -> Self {
        let obj = Amf0Object::new()
            .with("app", app)
            .with("type", "nonprivate")
            .with("flashVer", "FMLE/3.0")
            .with("tcUrl", tc_url);
        RtmpCommand::new(CMD_CONNECT, 1.0).with_object(obj)
    }

    /// Create createStream command
    pub(crate) fn create_stream(transaction_id: f64) -> Self {
        RtmpCommand::new(CMD_CREATE_STREAM, transaction_id).with_object(Amf0Value::Null)
    }

    /// Create releaseStream / FCPublish style command carrying a stream name
    pub(crate) fn stream_name_command(name: &str, transaction_id: f64, stream_name: &str) -> Self {
        RtmpCommand::new(name, transaction_id)
            .with_object(Amf0Value::Null)
            .with_argument(stream_name)
    }

    /// Create publish command
    pub(crate) fn publish(stream_name: &str, publish_type: &str) -> Self {
        RtmpCommand::new(CMD_PUBLISH, 0.0)
            .with_object(Amf0Value::Null)
            .with_argument(stream_name)
            .with_argument(publish_type)
    }
}
