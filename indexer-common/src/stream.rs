// This file is part of midnight-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_stream::try_stream;
use futures::{Stream, StreamExt, stream};
use std::{future::Future, iter};

/// Flattens a stream of results of chunks of items into a stream of results of items.
pub fn flatten_chunks<T, E>(
    chunks: impl Stream<Item = Result<Vec<T>, E>>,
) -> impl Stream<Item = Result<T, E>> {
    chunks.flat_map(|chunk: Result<Vec<_>, E>| match chunk {
        Ok(chunk) => stream::iter(chunk.into_iter().map(Ok)).left_stream(),
        Err(error) => stream::iter(iter::once(Err(error))).right_stream(),
    })
}

/// A stream of offset-based pages: `fetch` is called with increasing offsets until it returns a
/// page shorter than `page_size`. Empty pages are not emitted.
pub fn offset_pages<T, E, F, Fut>(
    page_size: usize,
    mut fetch: F,
) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    try_stream! {
        let mut offset = 0;

        loop {
            let page = fetch(offset).await?;
            let len = page.len();

            if len > 0 {
                yield page;
            }

            if len < page_size.max(1) {
                break;
            }

            offset += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::stream::{flatten_chunks, offset_pages};
    use assert_matches::assert_matches;
    use futures::{TryStreamExt, future::ready, stream};
    use std::{cell::RefCell, convert::Infallible};

    #[tokio::test]
    async fn test_flatten_chunks() {
        let chunks = stream::iter(vec![Ok::<_, Infallible>(vec![1, 2, 3]), Ok(vec![4, 5, 6])]);
        let flattened = flatten_chunks(chunks).try_collect::<Vec<_>>().await;
        assert_matches!(flattened, Ok(x) if x == vec![1, 2, 3, 4, 5, 6]);

        let chunks = stream::iter(vec![Ok::<_, &'static str>(vec![1, 2, 3]), Err("error")]);
        let mut flattened = flatten_chunks(chunks);
        assert_eq!(flattened.try_next().await, Ok(Some(1)));
        assert_eq!(flattened.try_next().await, Ok(Some(2)));
        assert_eq!(flattened.try_next().await, Ok(Some(3)));
        assert_eq!(flattened.try_next().await, Err("error"));
    }

    #[tokio::test]
    async fn test_offset_pages() {
        let items = (0..7).collect::<Vec<u32>>();
        let offsets = RefCell::new(vec![]);

        let pages = offset_pages(3, |offset| {
            offsets.borrow_mut().push(offset);
            let page = items.iter().copied().skip(offset).take(3).collect::<Vec<_>>();
            ready(Ok::<_, Infallible>(page))
        });
        let collected = flatten_chunks(pages).try_collect::<Vec<_>>().await;

        assert_matches!(collected, Ok(x) if x == items);
        assert_eq!(*offsets.borrow(), vec![0, 3, 6]);
    }

    #[tokio::test]
    async fn test_offset_pages_exact_multiple() {
        let items = (0..4).collect::<Vec<u32>>();

        let pages = offset_pages(2, |offset| {
            let page = items.iter().copied().skip(offset).take(2).collect::<Vec<_>>();
            ready(Ok::<_, Infallible>(page))
        })
        .try_collect::<Vec<_>>()
        .await;

        assert_matches!(pages, Ok(x) if x == vec![vec![0, 1], vec![2, 3]]);
    }
}
