//! Mensajes JSON delimitados por salto de línea.
use log::warn;
use serde::Serialize;
use serde_json::Value;

pub const DELIMITER: u8 = b'\n';

#[derive(Debug, Serialize)]
pub struct OutgoingMessage<'a> {
    pub event: &'a str,
    pub uuid: String,
    pub data: &'a Value,
}

impl OutgoingMessage<'_> {
    /// Línea lista para escribir en el socket, con delimitador final.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(DELIMITER);
        Ok(line)
    }
}

/// Acumula bytes entrantes y entrega cada segmento completo ya parseado.
/// Lo que queda después del último delimitador se guarda para la próxima
/// lectura.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    pending: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segmentos que no son JSON válido se descartan con un warning.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.pending.extend_from_slice(bytes);
        let mut messages = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == DELIMITER) {
            let segment: Vec<u8> = self.pending.drain(..=end).collect();
            let body = &segment[..segment.len() - 1];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(body) {
                Ok(message) => messages.push(message),
                Err(err) => warn!("invalid message from hooks handler ({err}): {}", String::from_utf8_lossy(body)),
            }
        }
        messages
    }

    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_messages_are_reassembled() {
        let mut buffer = MessageBuffer::new();
        assert!(buffer.push(br#"{"uuid":"a","da"#).is_empty());
        let messages = buffer.push(b"ta\":1}\n{\"uuid\":\"b\"}\n{\"uu");
        assert_eq!(messages, vec![json!({"uuid": "a", "data": 1}), json!({"uuid": "b"})]);
        assert_eq!(buffer.remainder(), b"{\"uu");
    }

    #[test]
    fn blank_and_invalid_segments_are_skipped() {
        let mut buffer = MessageBuffer::new();
        let messages = buffer.push(b"\n  \nnot json\n{\"ok\":true}\n");
        assert_eq!(messages, vec![json!({"ok": true})]);
        assert!(buffer.remainder().is_empty());
    }

    #[test]
    fn outgoing_line_ends_with_delimiter() {
        let data = json!({"name": "T"});
        let line = OutgoingMessage { event: "beforeEach", uuid: "u-1".into(), data: &data }.to_line().unwrap();
        assert_eq!(line.last(), Some(&DELIMITER));
        let parsed: Value = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(parsed, json!({"event": "beforeEach", "uuid": "u-1", "data": {"name": "T"}}));
    }
}
