use serde::Serialize;

use gemification_core::domain::group::GroupName;
use gemification_core::flows::notices::{ChoiceValue, Prompt};
use gemification_core::flows::DialogueKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Text-only message; Slack renders the fallback text as mrkdwn.
pub fn plain_message(text: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new(text).build()
}

/// Renders a dialogue prompt, with one button per choice when the prompt has choices.
pub fn prompt_message(kind: DialogueKind, prompt: &Prompt) -> MessageTemplate {
    let text = prompt.text();
    let choices = prompt.choices();
    if choices.is_empty() {
        return plain_message(text);
    }

    let flow = kind.as_str();
    let mut builder = MessageBuilder::new(text.clone())
        .section(format!("gem.{flow}.prompt.v1"), |section| {
            section.mrkdwn(text);
        });
    if let Some(title) = prompt.title() {
        builder = builder.section(format!("gem.{flow}.title.v1"), |section| {
            section.mrkdwn(title);
        });
    }
    builder
        .actions(format!("gem.{flow}.choices.v1"), |actions| {
            let mut group_index = 0;
            for choice in &choices {
                let button = match &choice.value {
                    ChoiceValue::Answer(true) => {
                        ButtonElement::new(format!("gem.{flow}.yes.v1"), choice.label.clone())
                            .style(ButtonStyle::Primary)
                            .value("yes")
                    }
                    ChoiceValue::Answer(false) => {
                        ButtonElement::new(format!("gem.{flow}.no.v1"), choice.label.clone())
                            .value("no")
                    }
                    ChoiceValue::Group(group) => {
                        group_index += 1;
                        ButtonElement::new(
                            format!("gem.{flow}.group.{group_index}.v1"),
                            choice.label.clone(),
                        )
                        .value(group.as_str())
                    }
                    ChoiceValue::Skip => {
                        ButtonElement::new(format!("gem.{flow}.skip.v1"), choice.label.clone())
                            .style(ButtonStyle::Danger)
                            .value("skip")
                    }
                };
                actions.button(button);
            }
        })
        .build()
}

/// A clicked dialogue button decoded back into the flow it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceAction {
    pub kind: DialogueKind,
    pub value: ChoiceValue,
}

/// Decodes `gem.<flow>.<yes|no|skip|group.N>.v1`; group buttons carry the group name as value.
pub fn parse_choice_action(action_id: &str, value: Option<&str>) -> Option<ChoiceAction> {
    let parts: Vec<&str> = action_id.split('.').collect();
    let (flow, action) = match parts.as_slice() {
        ["gem", flow, action, "v1"] => (*flow, *action),
        ["gem", flow, "group", index, "v1"] if index.parse::<u32>().is_ok() => (*flow, "group"),
        _ => return None,
    };
    let kind = DialogueKind::parse(flow)?;
    let value = match action {
        "yes" => ChoiceValue::Answer(true),
        "no" => ChoiceValue::Answer(false),
        "skip" => ChoiceValue::Skip,
        "group" => ChoiceValue::Group(GroupName::parse(value?).ok()?),
        _ => return None,
    };

    Some(ChoiceAction { kind, value })
}

#[cfg(test)]
mod tests {
    use gemification_core::domain::group::GroupName;
    use gemification_core::domain::user::{Member, SlackUserId};
    use gemification_core::flows::notices::{ChoiceValue, Prompt};
    use gemification_core::flows::DialogueKind;

    use super::{
        parse_choice_action, plain_message, prompt_message, Block, ButtonStyle, ChoiceAction,
        MessageBuilder, TextObject,
    };

    fn groups() -> Vec<GroupName> {
        vec![GroupName::from_stored("Backend"), GroupName::from_stored("Design")]
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("gem.test.section.v1", |section| {
                section.mrkdwn("*hello*");
            })
            .context("gem.test.context.v1", |context| {
                context.plain("context");
            })
            .build();

        assert_eq!(message.fallback_text, "fallback");
        assert_eq!(
            message.blocks[0],
            Block::Section {
                block_id: "gem.test.section.v1".to_owned(),
                text: TextObject::mrkdwn("*hello*"),
            }
        );
        assert!(matches!(message.blocks[1], Block::Context { .. }));
    }

    #[test]
    fn prompts_without_choices_are_plain_text() {
        let message = prompt_message(DialogueKind::AddAdmin, &Prompt::AdminCandidate);
        assert_eq!(message, plain_message(Prompt::AdminCandidate.text()));
        assert!(message.blocks.is_empty());
    }

    #[test]
    fn assignment_prompt_renders_numbered_group_buttons_and_skip() {
        let member = Member {
            id: SlackUserId::new("U1"),
            name: "alice".to_owned(),
            real_name: Some("Alice Adams".to_owned()),
            is_bot: false,
            deleted: false,
        };
        let prompt = Prompt::AssignMember { member, groups: groups() };
        let message = prompt_message(DialogueKind::TeamBootstrap, &prompt);

        assert_eq!(message.blocks.len(), 3);
        let Block::Actions { block_id, elements } = &message.blocks[2] else {
            panic!("expected an actions block");
        };
        assert_eq!(block_id, "gem.bootstrap.choices.v1");
        let ids: Vec<&str> = elements.iter().map(|button| button.action_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["gem.bootstrap.group.1.v1", "gem.bootstrap.group.2.v1", "gem.bootstrap.skip.v1"]
        );
        assert_eq!(elements[1].value.as_deref(), Some("Design"));
        assert_eq!(elements[2].style, Some(ButtonStyle::Danger));
    }

    #[test]
    fn confirmation_buttons_round_trip_through_action_parser() {
        let prompt = Prompt::ConfirmAdminGrant { target: SlackUserId::new("U2") };
        let message = prompt_message(DialogueKind::AddAdmin, &prompt);
        let Some(Block::Actions { elements, .. }) = message.blocks.last() else {
            panic!("expected an actions block");
        };

        let parsed: Vec<Option<ChoiceAction>> = elements
            .iter()
            .map(|button| parse_choice_action(&button.action_id, button.value.as_deref()))
            .collect();
        assert_eq!(
            parsed,
            vec![
                Some(ChoiceAction { kind: DialogueKind::AddAdmin, value: ChoiceValue::Answer(true) }),
                Some(ChoiceAction { kind: DialogueKind::AddAdmin, value: ChoiceValue::Answer(false) }),
            ]
        );
    }

    #[test]
    fn unknown_or_malformed_action_ids_are_rejected() {
        assert_eq!(parse_choice_action("gem.refresh", None), None);
        assert_eq!(parse_choice_action("gem.unknown.yes.v1", None), None);
        assert_eq!(parse_choice_action("gem.reconfigure.group.x.v1", Some("Ops")), None);
        assert_eq!(parse_choice_action("gem.reconfigure.group.1.v1", None), None);
        assert_eq!(
            parse_choice_action("gem.reconfigure.group.1.v1", Some("ops")),
            Some(ChoiceAction {
                kind: DialogueKind::Reconfigure,
                value: ChoiceValue::Group(GroupName::from_stored("Ops")),
            })
        );
    }
}
