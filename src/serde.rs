use crate::{MirroredRingBuffer, Slot};
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Serialize,
};
use std::fmt;

impl Serialize for MirroredRingBuffer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

struct MirroredRingBufferVisitor;

impl<'de> Visitor<'de> for MirroredRingBufferVisitor {
    type Value = MirroredRingBuffer;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of i64 slots")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut slots: Vec<Slot> = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(slot) = seq.next_element()? {
            slots.push(slot);
        }
        // Mapping the backing region can fail; surface that as a data error
        // rather than a panic.
        let mut buffer = MirroredRingBuffer::with_capacity(slots.len()).map_err(de::Error::custom)?;
        for slot in slots {
            buffer.push_back(slot);
        }
        Ok(buffer)
    }
}

impl<'de> Deserialize<'de> for MirroredRingBuffer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(MirroredRingBufferVisitor)
    }
}
