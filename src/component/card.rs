use crate::component::{CalendarObject, ComponentKind};
use crate::error::{PollError, Result};
use crate::jcal::JcalComponent;

/// A directory entry (jCard) returned by a calendar user search
#[derive(Clone, Debug)]
pub struct CardObject {
    cutype: String,
    cuaddr: String,
    object: CalendarObject,
}

impl CardObject {
    pub fn new<S: Into<String>, T: Into<String>>(cutype: S, cuaddr: T, data: JcalComponent) -> Result<Self> {
        let object = CalendarObject::from_jcal(data)?;
        if object.kind(object.root()) != Some(ComponentKind::Card) {
            return Err(PollError::structure("a card object must hold a VCARD"));
        }
        Ok(Self { cutype: cutype.into(), cuaddr: cuaddr.into(), object })
    }

    pub fn cutype(&self) -> &str { &self.cutype }
    pub fn cuaddr(&self) -> &str { &self.cuaddr }
    pub fn object(&self) -> &CalendarObject { &self.object }

    /// The FN property, if any
    pub fn full_name(&self) -> Option<&str> {
        self.object.property_text(self.object.root(), "fn")
    }
}
