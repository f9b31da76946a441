//! Ticket text composed from GitHub events.

use crate::tickets::{Attachment, NewTicket, TicketReply};
use crate::types::IssueId;
use crate::webhooks::{IssueCommentEvent, IssueEvent};

/// Name of the attachment carrying an issue body (`comment_id` 0) or a
/// comment body.
pub fn attachment_filename(issue: IssueId, comment_id: u64) -> String {
    format!("issue_{issue}_comment_{comment_id}.md")
}

/// Ticket for a newly opened issue. The issue body travels as an attachment
/// so markdown survives RT's text handling.
pub fn new_ticket(requestor: &str, event: &IssueEvent) -> NewTicket {
    let issue = &event.issue;
    let repo = &event.repository;

    NewTicket {
        requestor: requestor.to_string(),
        subject: format!("[{}] {}", repo.name, issue.title),
        text: format!(
            "{} created issue {} in GitHub repo {}.\nURL: {}",
            event.sender, issue.number, repo.full_name, issue.html_url
        ),
        attachments: vec![Attachment::markdown(
            attachment_filename(issue.id, 0),
            issue.body.clone(),
        )],
    }
}

/// Correspondence for a created, edited, or deleted comment.
pub fn comment_reply(event: &IssueCommentEvent) -> TicketReply {
    let comment = &event.comment;

    TicketReply {
        text: format!(
            "{} {} a comment in issue {} in GitHub repo {}.\nURL: {}",
            event.sender,
            event.action.as_str(),
            event.issue.number,
            event.repository.full_name,
            comment.html_url
        ),
        attachments: vec![Attachment::markdown(
            attachment_filename(event.issue.id, comment.id.0),
            comment.body.clone(),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommentId, IssueNumber};
    use crate::webhooks::{Comment, CommentAction, Issue, IssueAction, Repository};

    fn issue_event() -> IssueEvent {
        IssueEvent {
            action: IssueAction::Opened,
            repository: Repository {
                full_name: "octo/widgets".into(),
                name: "widgets".into(),
            },
            issue: Issue {
                id: IssueId(1001),
                number: IssueNumber(7),
                title: "Widget explodes".into(),
                body: "## Steps\n1. touch widget".into(),
                html_url: "https://github.com/octo/widgets/issues/7".into(),
            },
            sender: "alice".into(),
        }
    }

    #[test]
    fn new_ticket_subject_and_text() {
        let ticket = new_ticket("support@example.com", &issue_event());

        assert_eq!(ticket.requestor, "support@example.com");
        assert_eq!(ticket.subject, "[widgets] Widget explodes");
        assert_eq!(
            ticket.text,
            "alice created issue #7 in GitHub repo octo/widgets.\n\
             URL: https://github.com/octo/widgets/issues/7"
        );
    }

    #[test]
    fn new_ticket_attaches_issue_body() {
        let ticket = new_ticket("r@example.com", &issue_event());

        assert_eq!(
            ticket.attachments,
            vec![Attachment::markdown(
                "issue_1001_comment_0.md",
                "## Steps\n1. touch widget"
            )]
        );
    }

    #[test]
    fn comment_reply_text_and_attachment() {
        let base = issue_event();
        let event = IssueCommentEvent {
            action: CommentAction::Edited,
            repository: base.repository,
            issue: base.issue,
            comment: Comment {
                id: CommentId(555),
                body: "Fixed in main?".into(),
                html_url: "https://github.com/octo/widgets/issues/7#issuecomment-555".into(),
            },
            sender: "bob".into(),
        };

        let reply = comment_reply(&event);

        assert_eq!(
            reply.text,
            "bob edited a comment in issue #7 in GitHub repo octo/widgets.\n\
             URL: https://github.com/octo/widgets/issues/7#issuecomment-555"
        );
        assert_eq!(reply.attachments.len(), 1);
        assert_eq!(reply.attachments[0].filename, "issue_1001_comment_555.md");
        assert_eq!(reply.attachments[0].content, "Fixed in main?");
    }
}
