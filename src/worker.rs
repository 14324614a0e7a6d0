// ============================================
// src/worker.rs
// カード生成をバックグラウンドスレッドで実行する
// ============================================

use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use tracing::{debug, error};

use crate::card::LearningCard;
use crate::generator::CardSource;

/// 描画ループを止めずにカードを生成するためのワーカー
pub struct CardWorker {
    requests: Sender<Vec<String>>,
    cards: Receiver<LearningCard>,
    pending: bool,
}

impl CardWorker {
    pub fn spawn<C>(source: C) -> io::Result<Self>
    where
        C: CardSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<Vec<String>>();
        let (card_tx, card_rx) = mpsc::channel();

        thread::Builder::new()
            .name("card-generator".to_string())
            .spawn(move || {
                // リクエストは1件ずつ順番に処理する
                for exclude in request_rx {
                    debug!(excluded = exclude.len(), "generating next card");
                    let card = source.next_card(&exclude);
                    if card_tx.send(card).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: request_tx,
            cards: card_rx,
            pending: false,
        })
    }

    /// 生成を依頼する
    pub fn request(&mut self, exclude_words: Vec<String>) {
        self.pending = true;
        if self.requests.send(exclude_words).is_err() {
            error!("card worker is gone, fallback card will be used");
        }
    }

    /// 完成したカードを受け取る（無ければ None）
    pub fn poll(&mut self) -> Option<LearningCard> {
        if !self.pending {
            return None;
        }
        match self.cards.try_recv() {
            Ok(card) => {
                self.pending = false;
                Some(card)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                error!("card worker stopped unexpectedly, using fallback card");
                self.pending = false;
                Some(LearningCard::fallback())
            }
        }
    }
}
