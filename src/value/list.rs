//! List (EXI 7.1.11).
//!
//! Anzahl der Einträge als Unsigned Integer, danach jeder Eintrag mit dem
//! Codec des Item-Typs. Dekodierte Einträge werden mit einem Leerzeichen
//! verbunden in der Arena abgelegt.

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::grammar::Variety;
use crate::scribble::{Scribble, StagedValue};
use crate::{Error, Result, unsigned_integer};

/// Obergrenze für die Anzahl der Einträge beim Decodieren.
const MAX_ITEMS: u64 = 1 << 24;

pub(super) struct ListCodec;

fn item_type<'g>(ty: TypeRef<'g>) -> TypeRef<'g> {
    match ty.info.map(|t| t.variety) {
        Some(Variety::List(item)) => TypeRef::typed(ty.grammar, item),
        _ => TypeRef::untyped(ty.grammar),
    }
}

fn item_codec(item: TypeRef<'_>) -> &'static dyn ValueCodec {
    super::codec_for(item.info, false)
}

impl ValueCodec for ListCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::List
    }

    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        let item = item_type(ty);
        let codec = item_codec(item);
        for part in lexical.split(super::is_xml_space).filter(|s| !s.is_empty()) {
            let mut staged = Scribble::new();
            if !super::stage(codec, part, item, &mut staged) {
                scribble.items.clear();
                return false;
            }
            scribble.items.push(staged);
        }
        scribble.value = StagedValue::List;
        true
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        if scribble.value != StagedValue::List {
            return Err(super::not_staged(self.codec_id()));
        }
        let item = item_type(ty);
        let codec = item_codec(item);
        unsigned_integer::encode(out.writer, scribble.items.len() as u64)?;
        scribble.items.iter().try_for_each(|staged| codec.write(staged, item, out))
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let count = unsigned_integer::decode(input.reader)?;
        if count > MAX_ITEMS {
            return Err(Error::ListLengthOverflow(count));
        }
        let item = item_type(ty);
        let codec = item_codec(item);
        let start = input.arena.len();
        for i in 0..count {
            if i > 0 {
                input.arena.push(' ');
            }
            // Arena-Einträge liegen bereits am Ende, der Rest wird kopiert
            match codec.read(item, input)? {
                TextRef::Arena(_) => {}
                TextRef::Shared(rc) => input.arena.push_str(&rc),
                octets @ TextRef::Octets(..) => {
                    let rendered = octets.view("", &input.octets[..]).text().into_owned();
                    input.arena.push_str(&rendered);
                }
            }
        }
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
