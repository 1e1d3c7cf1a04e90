use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::app_err::{AppResult, ApplicationError};
use crate::aws_ec2::model::Instance;
use crate::aws_ec2::{Ec2Api, InstanceFilter};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazily lists the instances for `project`, or every instance when `None`.
///
/// Nothing is fetched until the stream is polled, and every call starts a
/// fresh listing.
pub fn resolve<'a>(
    api: &'a dyn Ec2Api,
    project: Option<&'a str>,
) -> BoxStream<'a, AppResult<Instance>> {
    let filter = InstanceFilter::from_project(project);

    stream::try_unfold(Cursor::Start, move |cursor| {
        let filter = filter.clone();
        async move {
            let token = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok::<_, ApplicationError>(None),
            };

            let page = api.describe_instances(&filter, token).await?;
            let next = match page.next_token {
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };
            Ok(Some((stream::iter(page.items.into_iter().map(Ok::<_, ApplicationError>)), next)))
        }
    })
    .try_flatten()
    // EC2 tag filter values accept `*` and `?` wildcards; keep exact matches only.
    .try_filter(move |instance| {
        let keep = project.is_none_or(|name| instance.tags.project() == Some(name));
        futures::future::ready(keep)
    })
    .boxed()
}

/// Mutating commands refuse to touch the whole account unless forced.
pub fn require_scope(project: Option<&str>, force: bool) -> AppResult<()> {
    if project.is_none() && !force {
        return Err(ApplicationError::usage(
            "You need to specify a --project name or --force option",
        ));
    }
    Ok(())
}
