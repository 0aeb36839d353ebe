//! Typed calendar objects
//!
//! A [`CalendarObject`] owns a whole resource (usually a VCALENDAR) as an arena of nodes.
//! Components are addressed by [`ComponentId`]s, each node knows its parent, and the "changed"
//! flag lives on the object itself: modifying any component marks the whole resource dirty.
//!
//! Sub-components of a type this crate does not model (VTIMEZONE, VALARM...) are kept as raw
//! jCal, in their original position, so that they survive a round trip to the server.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{PollError, Result};
use crate::jcal::{new_calendar, JcalComponent, JcalProperty};
use crate::recurrence::RecurrenceRule;
use crate::session::Session;
use crate::temporal::{parse_duration, FieldType, Role, TemporalValue};
use crate::user::{CalendarUser, CalendarUserMut};

mod card;
pub use card::CardObject;
mod poll;
mod voter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Calendar,
    Poll,
    Event,
    Task,
    Voter,
    Vote,
    Card,
}

impl ComponentKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "vcalendar" => Ok(ComponentKind::Calendar),
            "vpoll" => Ok(ComponentKind::Poll),
            "vevent" => Ok(ComponentKind::Event),
            "vtodo" => Ok(ComponentKind::Task),
            "vvoter" | "voter" => Ok(ComponentKind::Voter),
            "vote" => Ok(ComponentKind::Vote),
            "vcard" => Ok(ComponentKind::Card),
            other => Err(PollError::UnknownComponentType(other.to_string())),
        }
    }

    /// The jCal name used for components created by this crate
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Calendar => "vcalendar",
            ComponentKind::Poll => "vpoll",
            ComponentKind::Event => "vevent",
            ComponentKind::Task => "vtodo",
            ComponentKind::Voter => "vvoter",
            ComponentKind::Vote => "vote",
            ComponentKind::Card => "vcard",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(usize);

#[derive(Clone, Debug, PartialEq)]
enum Child {
    Component(ComponentId),
    Opaque(JcalComponent),
}

#[derive(Clone, Debug)]
struct Node {
    kind: ComponentKind,
    /// Name and properties. Its sub-component list is always empty: children are in `children`
    data: JcalComponent,
    parent: Option<ComponentId>,
    children: Vec<Child>,
    start: Option<TemporalValue>,
    end: Option<TemporalValue>,
}

#[derive(Clone, Debug)]
pub struct CalendarObject {
    nodes: Vec<Option<Node>>,
    root: ComponentId,
    changed: bool,
    /// Highest poll-item-id handed out so far
    item_id_floor: i64,
}

impl CalendarObject {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: ComponentId(0),
            changed: false,
            item_id_floor: 0,
        }
    }

    /// Build the typed tree. The top-level component must be of a known type.
    /// A freshly built object is not changed.
    pub fn from_jcal(data: JcalComponent) -> Result<Self> {
        let kind = ComponentKind::from_name(data.name())?;
        let mut object = Self::empty();
        object.root = object.insert_tree(data, None, kind);
        Ok(object)
    }

    /// An empty VCALENDAR
    pub fn new_calendar() -> Self {
        let mut object = Self::empty();
        object.root = object.insert_tree(new_calendar(), None, ComponentKind::Calendar);
        object
    }

    fn insert_tree(&mut self, mut data: JcalComponent, parent: Option<ComponentId>, kind: ComponentKind) -> ComponentId {
        let sub_components = data.take_components();
        let id = ComponentId(self.nodes.len());
        self.nodes.push(Some(Node { kind, data, parent, children: Vec::new(), start: None, end: None }));

        for sub in sub_components {
            let child = match ComponentKind::from_name(sub.name()) {
                Ok(kind) => Child::Component(self.insert_tree(sub, Some(id), kind)),
                Err(_) => {
                    log::debug!("Keeping a {} as an opaque sub-component", sub.name());
                    Child::Opaque(sub)
                },
            };
            if let Some(node) = self.nodes[id.0].as_mut() {
                node.children.push(child);
            }
        }
        id
    }

    /// Serialize back to jCal. Opaque sub-components are written back where they were
    pub fn to_jcal(&self) -> JcalComponent {
        self.component_to_jcal(self.root).unwrap_or_else(|| JcalComponent::new("vcalendar"))
    }

    /// Serialize a single component and its sub-components
    pub fn component_to_jcal(&self, id: ComponentId) -> Option<JcalComponent> {
        let node = self.node(id)?;
        let mut data = node.data.clone();
        let components = node.children.iter()
            .filter_map(|child| match child {
                Child::Component(child_id) => self.component_to_jcal(*child_id),
                Child::Opaque(raw) => Some(raw.clone()),
            })
            .collect();
        data.set_components(components);
        Some(data)
    }

    /// A deep copy, with its changed flag cleared
    pub fn duplicate(&self) -> Self {
        let root_kind = self.kind(self.root).unwrap_or(ComponentKind::Calendar);
        let mut copy = Self::empty();
        copy.root = copy.insert_tree(self.to_jcal(), None, root_kind);
        copy.item_id_floor = self.item_id_floor;
        copy
    }

    /// Whether the resource has been modified since it was loaded or last saved
    pub fn changed(&self) -> bool { self.changed }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    pub(crate) fn mark_changed(&mut self) {
        if !self.changed {
            log::trace!("Calendar object is now modified");
        }
        self.changed = true;
    }

    pub fn item_id_floor(&self) -> i64 { self.item_id_floor }

    /// Make sure no poll-item-id lower than or equal to `floor` is issued again
    pub fn raise_item_id_floor(&mut self, floor: i64) {
        self.item_id_floor = self.item_id_floor.max(floor);
    }

    //
    // Tree navigation
    //

    fn node(&self, id: ComponentId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ComponentId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| PollError::structure(format!("component {:?} does not exist", id)))
    }

    pub(crate) fn expect_kind(&self, id: ComponentId, kind: ComponentKind) -> Result<()> {
        match self.kind(id) {
            Some(actual) if actual == kind => Ok(()),
            Some(actual) => Err(PollError::structure(format!("expected a {}, found a {}", kind.name(), actual.name()))),
            None => Err(PollError::structure(format!("component {:?} does not exist", id))),
        }
    }

    pub fn root(&self) -> ComponentId { self.root }

    pub fn kind(&self, id: ComponentId) -> Option<ComponentKind> {
        self.node(id).map(|node| node.kind)
    }

    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.node(id)?.parent
    }

    /// The component's name and own properties
    pub fn data(&self, id: ComponentId) -> Option<&JcalComponent> {
        self.node(id).map(|node| &node.data)
    }

    /// Typed sub-components, in document order
    pub fn children(&self, id: ComponentId) -> Vec<ComponentId> {
        self.node(id)
            .map(|node| node.children.iter()
                .filter_map(|child| match child {
                    Child::Component(child_id) => Some(*child_id),
                    Child::Opaque(_) => None,
                })
                .collect())
            .unwrap_or_default()
    }

    /// Sub-components this crate does not model
    pub fn opaque_children(&self, id: ComponentId) -> Vec<&JcalComponent> {
        self.node(id)
            .map(|node| node.children.iter()
                .filter_map(|child| match child {
                    Child::Opaque(raw) => Some(raw),
                    Child::Component(_) => None,
                })
                .collect())
            .unwrap_or_default()
    }

    /// Every typed component below `id`, depth first
    pub fn descendants(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut found = Vec::new();
        for child in self.children(id) {
            found.push(child);
            found.extend(self.descendants(child));
        }
        found
    }

    /// Whether this component is part of the serialized tree (duplicates are detached until saved)
    pub fn is_attached(&self, id: ComponentId) -> bool {
        if id == self.root {
            return self.node(id).is_some();
        }
        match self.parent(id) {
            Some(parent) => {
                let listed = self.node(parent)
                    .map(|node| node.children.contains(&Child::Component(id)))
                    .unwrap_or(false);
                listed && self.is_attached(parent)
            },
            None => false,
        }
    }

    /// The first typed sub-component of the root (the VPOLL, VEVENT or VTODO of a resource)
    pub fn main_component(&self) -> Option<ComponentId> {
        self.children(self.root).into_iter().next()
    }

    /// Copy a component and its sub-components. The copy keeps the same parent but is detached:
    /// it is not part of the tree until it is saved back (see `save_choice`)
    pub fn duplicate_component(&mut self, id: ComponentId) -> Result<ComponentId> {
        let data = self.component_to_jcal(id).ok_or_else(|| PollError::structure(format!("component {:?} does not exist", id)))?;
        let kind = ComponentKind::from_name(data.name())?;
        let parent = self.parent(id);
        Ok(self.insert_tree(data, parent, kind))
    }

    /// Forget a detached component
    pub fn discard(&mut self, id: ComponentId) {
        if !self.is_attached(id) {
            self.remove_subtree(id);
        }
    }

    pub(crate) fn attach_new(&mut self, parent: ComponentId, data: JcalComponent, kind: ComponentKind) -> Result<ComponentId> {
        if self.node(parent).is_none() {
            return Err(PollError::structure(format!("component {:?} does not exist", parent)));
        }
        let id = self.insert_tree(data, Some(parent), kind);
        self.node_mut(parent)?.children.push(Child::Component(id));
        Ok(id)
    }

    pub(crate) fn attach(&mut self, parent: ComponentId, id: ComponentId) -> Result<()> {
        self.node_mut(id)?.parent = Some(parent);
        let node = self.node_mut(parent)?;
        if !node.children.contains(&Child::Component(id)) {
            node.children.push(Child::Component(id));
        }
        Ok(())
    }

    /// Detach a component from its parent and drop it with its sub-components
    pub(crate) fn remove_component(&mut self, id: ComponentId) -> Result<()> {
        if let Some(parent) = self.parent(id) {
            self.node_mut(parent)?.children.retain(|child| *child != Child::Component(id));
        }
        self.remove_subtree(id);
        Ok(())
    }

    fn remove_subtree(&mut self, id: ComponentId) {
        for child in self.children(id) {
            self.remove_subtree(child);
        }
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
        }
    }

    //
    // Property access
    //

    pub fn property(&self, id: ComponentId, name: &str) -> Option<&JcalProperty> {
        self.data(id)?.get_property(name)
    }

    pub fn property_text(&self, id: ComponentId, name: &str) -> Option<&str> {
        self.data(id)?.get_property_text(name)
    }

    pub(crate) fn property_i64(&self, id: ComponentId, name: &str) -> Option<i64> {
        self.property(id, name)?.value_i64()
    }

    /// Set (or remove, for `None`) a property value. Only marks the object changed when the value differs
    pub fn set_property_value(&mut self, id: ComponentId, name: &str, value: Option<Value>, value_type: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.data.get_property_value(name) == value.as_ref() {
            return Ok(false);
        }
        match value {
            Some(value) => { node.data.update_property(name, value, Map::new(), value_type); },
            None => { node.data.remove_properties(name); },
        }
        self.mark_changed();
        Ok(true)
    }

    fn set_text(&mut self, id: ComponentId, name: &str, value: Option<&str>) -> Result<bool> {
        let value = check_str(value).map(|text| Value::String(text.to_string()));
        self.set_property_value(id, name, value, "text")
    }

    /// Modify the `index`th calendar-user property called `name`. The object is marked changed if
    /// the property ends up different
    pub fn update_user<F>(&mut self, id: ComponentId, name: &str, index: usize, update: F) -> Result<bool>
    where
        F: FnOnce(&mut CalendarUserMut<'_>),
    {
        let node = self.node_mut(id)?;
        let prop = node.data.properties_named_mut(name)
            .nth(index)
            .ok_or_else(|| PollError::structure(format!("there is no {} #{}", name, index)))?;
        let before = prop.clone();
        update(&mut CalendarUserMut::new(prop));
        let modified = *prop != before;
        if modified {
            self.mark_changed();
        }
        Ok(modified)
    }

    pub fn uid(&self, id: ComponentId) -> Option<&str> {
        self.property_text(id, "uid")
    }

    pub fn status(&self, id: ComponentId) -> Option<&str> {
        self.property_text(id, "status")
    }

    pub fn summary(&self, id: ComponentId) -> Option<&str> {
        self.property_text(id, "summary")
    }

    /// Blank summaries are removed
    pub fn set_summary(&mut self, id: ComponentId, summary: Option<&str>) -> Result<bool> {
        self.set_text(id, "summary", summary)
    }

    pub fn description(&self, id: ComponentId) -> Option<&str> {
        self.property_text(id, "description")
    }

    /// Blank descriptions are removed
    pub fn set_description(&mut self, id: ComponentId, description: Option<&str>) -> Result<bool> {
        self.set_text(id, "description", description)
    }

    pub fn organizer(&self, id: ComponentId) -> Option<CalendarUser<'_>> {
        self.property(id, "organizer").map(CalendarUser::new)
    }

    pub fn organizer_display_name(&self, id: ComponentId) -> Option<&str> {
        self.organizer(id).map(|organizer| organizer.name_or_address())
    }

    /// Whether the session's principal organizes this component
    pub fn is_owned(&self, session: &Session, id: ComponentId) -> bool {
        self.organizer(id)
            .map(|organizer| session.principal().matching_address(organizer.cuaddr()))
            .unwrap_or(false)
    }

    pub fn attendees(&self, id: ComponentId) -> Vec<CalendarUser<'_>> {
        self.data(id)
            .map(|data| data.properties_named("attendee").map(CalendarUser::new).collect())
            .unwrap_or_default()
    }

    pub fn is_event(&self, id: ComponentId) -> bool { self.kind(id) == Some(ComponentKind::Event) }
    pub fn is_task(&self, id: ComponentId) -> bool { self.kind(id) == Some(ComponentKind::Task) }

    pub fn poll_item_id(&self, id: ComponentId) -> Option<i64> {
        self.property_i64(id, "poll-item-id")
    }

    pub fn set_poll_item_id(&mut self, id: ComponentId, item_id: i64) -> Result<bool> {
        self.raise_item_id_floor(item_id);
        self.set_property_value(id, "poll-item-id", Some(Value::from(item_id)), "integer")
    }

    /// The poll-item-id of the winning choice, once the poll is confirmed
    pub fn poll_winner(&self, id: ComponentId) -> Option<i64> {
        self.property_i64(id, "poll-winner")
    }

    pub fn set_poll_winner(&mut self, id: ComponentId, item_id: i64) -> Result<bool> {
        self.set_property_value(id, "poll-winner", Some(Value::from(item_id)), "integer")
    }

    /// Whether this choice is the winner of the poll it belongs to
    pub fn is_poll_winner(&self, id: ComponentId) -> bool {
        let item_id = match self.poll_item_id(id) {
            Some(item_id) => item_id,
            None => return false,
        };
        self.parent(id)
            .and_then(|poll| self.poll_winner(poll))
            .map(|winner| winner == item_id)
            .unwrap_or(false)
    }

    //
    // Recurrence
    //

    /// Values of the RRULE properties
    pub fn rrules(&self, id: ComponentId) -> Vec<&Value> {
        self.data(id)
            .map(|data| data.properties_named("rrule").filter_map(JcalProperty::value).collect())
            .unwrap_or_default()
    }

    /// Replace every RRULE by `rule`, or remove them all
    pub fn set_rrule(&mut self, id: ComponentId, rule: Option<&RecurrenceRule>) -> Result<bool> {
        let node = self.node_mut(id)?;
        let before: Vec<JcalProperty> = node.data.properties_named("rrule").cloned().collect();
        node.data.remove_properties("rrule");
        if let Some(rule) = rule {
            node.data.new_property("rrule", rule.to_value(), Map::new(), "recur");
        }
        let after: Vec<JcalProperty> = node.data.properties_named("rrule").cloned().collect();
        if before == after {
            return Ok(false);
        }
        self.mark_changed();
        Ok(true)
    }

    pub fn rdates(&self, id: ComponentId) -> Vec<&JcalProperty> {
        self.data(id).map(|data| data.properties_named("rdate").collect()).unwrap_or_default()
    }

    pub fn exdates(&self, id: ComponentId) -> Vec<&JcalProperty> {
        self.data(id).map(|data| data.properties_named("exdate").collect()).unwrap_or_default()
    }

    //
    // Start and end
    //

    /// DTSTART. The value is built on first access, then cached (and updated by `set_start`)
    pub fn start(&mut self, session: &Session, id: ComponentId) -> Result<TemporalValue> {
        let node = self.node_mut(id)?;
        if let Some(start) = &node.start {
            return Ok(start.clone());
        }
        let prop = node.data.get_property("dtstart").ok_or_else(|| PollError::MalformedTemporalValue {
            value: String::new(),
            reason: format!("this {} has no DTSTART", node.kind.name()),
        })?;
        let mut start = TemporalValue::from_property(session, prop)?;
        start.set_field_type(FieldType::Date);
        node.start = Some(start.clone());
        Ok(start)
    }

    /// The end of a component: its DTEND (DUE for tasks) if any, else the start plus its DURATION.
    /// An all-day component with neither ends the day after it starts.
    pub fn end(&mut self, session: &Session, id: ComponentId) -> Result<TemporalValue> {
        if let Some(end) = self.node(id).and_then(|node| node.end.clone()) {
            return Ok(end);
        }
        let start = self.start(session, id)?;
        let node = self.node_mut(id)?;
        let end_name = if node.kind == ComponentKind::Task { "due" } else { "dtend" };

        let end = match node.data.get_property(end_name) {
            Some(prop) => TemporalValue::from_property(session, prop)?,
            None => {
                let mut end = start.duplicate_as(Role::End);
                match node.data.get_property_text("duration") {
                    None => {
                        if end.all_day() {
                            end.add_days(1)?;
                        }
                        end.set_field_type(session.preferred_end_type());
                    },
                    Some(duration) => {
                        end.add_seconds(parse_duration(duration)?.num_seconds())?;
                        end.set_field_type(FieldType::Duration);
                    },
                }
                end
            },
        };
        node.end = Some(end.clone());
        Ok(end)
    }

    pub fn set_start(&mut self, id: ComponentId, start: TemporalValue) -> Result<()> {
        let start = start.duplicate_as(Role::Start);
        let node = self.node_mut(id)?;
        start.update_property(&mut node.data, None)?;
        node.start = Some(start);
        self.mark_changed();
        Ok(())
    }

    pub fn set_end(&mut self, session: &Session, id: ComponentId, end: TemporalValue) -> Result<()> {
        let start = self.start(session, id)?;
        let field_type = end.field_type();
        let mut end = end.duplicate_as(Role::End);
        end.set_field_type(field_type);

        let node = self.node_mut(id)?;
        end.update_property(&mut node.data, Some(&start))?;
        node.end = Some(end);
        self.mark_changed();
        Ok(())
    }
}

/// Blank strings count as absent
fn check_str(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

impl FromStr for CalendarObject {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_jcal(s.parse()?)
    }
}

impl Display for CalendarObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_jcal())
    }
}
